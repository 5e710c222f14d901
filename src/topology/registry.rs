//! Block registry: an arena of blocks addressed by [`BlockId`] plus one
//! sparse grid per refinement level.

use crate::algs::metadata::GlobalMetadata;
use crate::amr_error::AmrError;
use crate::data::raw_block::{RawBlock, restore_ghost_layers};
use crate::data::scalar::ScalarArray;
use crate::topology::block::{Block, BlockId};
use crate::topology::level::Level;

#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    metadata: Option<GlobalMetadata>,
    blocks: Vec<Block>,
    levels: Vec<Level>,
    local_rank: usize,
}

impl BlockRegistry {
    /// Empty registry for `local_rank`; metadata must be set before blocks
    /// can be added.
    pub fn new(local_rank: usize) -> Self {
        Self {
            local_rank,
            ..Self::default()
        }
    }

    pub fn with_metadata(local_rank: usize, metadata: GlobalMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            local_rank,
            ..Self::default()
        }
    }

    pub fn set_metadata(&mut self, metadata: GlobalMetadata) {
        self.metadata = Some(metadata);
    }

    pub fn metadata(&self) -> Result<&GlobalMetadata, AmrError> {
        self.metadata.as_ref().ok_or(AmrError::MetadataNotInitialized)
    }

    pub fn local_rank(&self) -> usize {
        self.local_rank
    }

    pub fn number_of_levels(&self) -> usize {
        self.levels.len()
    }

    /// Total number of registered blocks, skeletons included.
    pub fn number_of_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn number_of_blocks_in_level(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, Level::len)
    }

    /// Blocks owned by this rank.
    pub fn number_of_local_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| b.owner == self.local_rank).count()
    }

    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(level)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    /// The `index`-th block of `level` in insertion order.
    pub fn block_in_level(&self, level: usize, index: usize) -> Option<&Block> {
        let id = *self.levels.get(level)?.blocks().get(index)?;
        Some(self.block(id))
    }

    /// Grid lookup. Absence is an ordinary answer, never an error.
    pub fn block_id_at(&self, level: usize, grid_index: [i64; 3]) -> Option<BlockId> {
        self.levels.get(level)?.get(grid_index)
    }

    pub fn block_at(&self, level: usize, grid_index: [i64; 3]) -> Option<&Block> {
        self.block_id_at(level, grid_index).map(|id| self.block(id))
    }

    /// Register a local raw block: place it on its level grid from its
    /// physical center, index its first voxel on the level lattice and pad
    /// any stripped ghost layer back in.
    pub fn add_block(&mut self, raw: RawBlock) -> Result<BlockId, AmrError> {
        let meta = *self.metadata()?;
        if raw.cells.scalar_type() != meta.scalar_type {
            log::warn!(
                "[registry] level {} block holds {:?}, reconciling as {:?}",
                raw.level,
                raw.cells.scalar_type(),
                meta.scalar_type
            );
        }
        let grid_index = meta.grid_index(raw.level, raw.center());
        let mut origin_index = meta.origin_index(raw.level, raw.first_voxel_origin());
        let dims = raw.cell_dimensions();
        let payload = match restore_ghost_layers(
            &raw.cells,
            dims,
            &mut origin_index,
            meta.standard_block_dimensions,
        ) {
            Some((padded, padded_dims)) => {
                log::debug!(
                    "[registry] level {} block {grid_index:?}: restored ghost layers {dims:?} -> {padded_dims:?}",
                    raw.level
                );
                padded
            }
            None => raw.cells,
        };
        let block = Block::new(
            raw.level,
            grid_index,
            origin_index,
            self.local_rank,
            Some(payload),
        );
        self.insert(block)
    }

    /// Register a block by grid coordinates, typically a skeleton received
    /// from another rank.
    pub fn add_grid_block(
        &mut self,
        level: usize,
        grid_index: [i64; 3],
        owner: usize,
        payload: Option<ScalarArray>,
    ) -> Result<BlockId, AmrError> {
        let origin_index = self.metadata()?.skeleton_origin_index(grid_index);
        self.insert(Block::new(level, grid_index, origin_index, owner, payload))
    }

    fn insert(&mut self, block: Block) -> Result<BlockId, AmrError> {
        let id = BlockId::new(self.blocks.len());
        let level = self.ensure_level(block.level);
        level.insert(block.grid_index, id)?;
        self.blocks.push(block);
        Ok(id)
    }

    fn ensure_level(&mut self, level: usize) -> &mut Level {
        while self.levels.len() <= level {
            let next = self.levels.len();
            self.levels.push(Level::new(next));
        }
        &mut self.levels[level]
    }

    /// Two distinct blocks borrowed mutably at once.
    pub(crate) fn pair_mut(&mut self, a: BlockId, b: BlockId) -> (&mut Block, &mut Block) {
        assert_ne!(a, b, "pair_mut needs two distinct blocks");
        let (i, j) = (a.index(), b.index());
        if i < j {
            let (lo, hi) = self.blocks.split_at_mut(j);
            (&mut lo[i], &mut hi[0])
        } else {
            let (lo, hi) = self.blocks.split_at_mut(i);
            (&mut hi[0], &mut lo[j])
        }
    }
}
