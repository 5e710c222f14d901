//! Shared block faces used to seed connected-component labeling across
//! block and level boundaries.

use crate::topology::region::Face;
use parking_lot::Mutex;
use std::sync::Arc;

/// A labeled dual point pushed onto a face by the connectivity pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FragmentSeed {
    pub index: [i64; 3],
    pub fragment_id: i32,
}

/// A face shared by up to two neighboring blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockFace {
    level: usize,
    normal_axis: usize,
    origin_index: [i64; 3],
    seeds: Vec<FragmentSeed>,
}

/// Faces are shared between the blocks on either side.
pub type SharedFace = Arc<Mutex<BlockFace>>;

impl BlockFace {
    /// Face `face` of a block at `level` whose first interior voxel is
    /// `interior_origin` and whose interior spans `dims` cells.
    pub fn for_block(level: usize, interior_origin: [i64; 3], dims: [i64; 3], face: Face) -> Self {
        let mut origin_index = interior_origin;
        if face.positive {
            origin_index[face.axis] += dims[face.axis];
        }
        Self {
            level,
            normal_axis: face.axis,
            origin_index,
            seeds: Vec::new(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn normal_axis(&self) -> usize {
        self.normal_axis
    }

    pub fn origin_index(&self) -> [i64; 3] {
        self.origin_index
    }

    pub fn seeds(&self) -> &[FragmentSeed] {
        &self.seeds
    }

    /// Record a seed. Faces always live on the coarser of their two blocks,
    /// which is processed first, so seeds from another level are rejected.
    pub fn add_fragment_seed(&mut self, level: usize, index: [i64; 3], fragment_id: i32) -> bool {
        if level != self.level {
            log::warn!(
                "fragment seed from level {level} rejected by face at level {}",
                self.level
            );
            return false;
        }
        self.seeds.push(FragmentSeed { index, fragment_id });
        true
    }
}
