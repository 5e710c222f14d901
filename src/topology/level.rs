//! One refinement level: a growable dense grid of block handles.
//!
//! Grid coordinates are block indices on the level's block lattice, not voxel
//! indices. The grid bounding box grows to cover every inserted coordinate and
//! never shrinks; growth reallocates and copies existing entries by position.

use crate::amr_error::AmrError;
use crate::topology::block::BlockId;

#[derive(Clone, Debug, Default)]
pub struct Level {
    level: usize,
    blocks: Vec<BlockId>,
    /// Inclusive `[x0, x1, y0, y1, z0, z1]`; `None` while the grid is empty.
    extent: Option<[i64; 6]>,
    grid: Vec<Option<BlockId>>,
}

impl Level {
    pub fn new(level: usize) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Blocks in insertion order.
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn grid_extent(&self) -> Option<[i64; 6]> {
        self.extent
    }

    /// O(1) lookup; out-of-range and empty slots are both `None`.
    pub fn get(&self, index: [i64; 3]) -> Option<BlockId> {
        let slot = linear_index(self.extent?, index)?;
        self.grid[slot]
    }

    /// Occupied slots in ascending linear-index order (z outermost).
    ///
    /// Every process that holds the same block set walks the same sequence,
    /// independent of insertion order.
    pub fn iter_grid(&self) -> impl Iterator<Item = ([i64; 3], BlockId)> + '_ {
        let ext = self.extent.unwrap_or([0, -1, 0, -1, 0, -1]);
        let nx = (ext[1] - ext[0] + 1).max(0) as usize;
        let ny = (ext[3] - ext[2] + 1).max(0) as usize;
        self.grid.iter().enumerate().filter_map(move |(slot, id)| {
            let id = (*id)?;
            let x = ext[0] + (slot % nx) as i64;
            let y = ext[2] + ((slot / nx) % ny) as i64;
            let z = ext[4] + (slot / (nx * ny)) as i64;
            Some(([x, y, z], id))
        })
    }

    pub(crate) fn insert(&mut self, index: [i64; 3], id: BlockId) -> Result<(), AmrError> {
        self.grow_to(index);
        let slot = self
            .extent
            .and_then(|ext| linear_index(ext, index))
            .ok_or_else(|| {
                AmrError::InvariantViolation(format!(
                    "level {} grid does not cover {index:?} after growth",
                    self.level
                ))
            })?;
        if self.grid[slot].is_some() {
            return Err(AmrError::DuplicateBlock {
                level: self.level,
                grid_index: index,
            });
        }
        self.grid[slot] = Some(id);
        self.blocks.push(id);
        Ok(())
    }

    fn grow_to(&mut self, index: [i64; 3]) {
        let old = self.extent;
        let mut new = old.unwrap_or([index[0], index[0], index[1], index[1], index[2], index[2]]);
        for a in 0..3 {
            new[2 * a] = new[2 * a].min(index[a]);
            new[2 * a + 1] = new[2 * a + 1].max(index[a]);
        }
        if old == Some(new) {
            return;
        }
        let mut grid = vec![None; extent_volume(new)];
        if let Some(old) = old {
            let mut slot = 0;
            for z in old[4]..=old[5] {
                for y in old[2]..=old[3] {
                    for x in old[0]..=old[1] {
                        if let Some(target) = linear_index(new, [x, y, z]) {
                            grid[target] = self.grid[slot];
                        }
                        slot += 1;
                    }
                }
            }
        }
        self.extent = Some(new);
        self.grid = grid;
    }
}

fn extent_volume(ext: [i64; 6]) -> usize {
    (0..3)
        .map(|a| (ext[2 * a + 1] - ext[2 * a] + 1) as usize)
        .product()
}

fn linear_index(ext: [i64; 6], index: [i64; 3]) -> Option<usize> {
    let mut slot = 0usize;
    let mut stride = 1usize;
    for a in 0..3 {
        let (lo, hi) = (ext[2 * a], ext[2 * a + 1]);
        if index[a] < lo || index[a] > hi {
            return None;
        }
        slot += (index[a] - lo) as usize * stride;
        stride *= (hi - lo + 1) as usize;
    }
    Some(slot)
}
