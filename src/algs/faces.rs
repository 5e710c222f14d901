//! Shared block faces for seeding connected-component labeling.
//!
//! Levels are walked coarse to fine. A face is taken from a coarser
//! neighbor first, then from a same-level neighbor, and only created when
//! neither has one, so the blocks on both sides of a boundary hold the same
//! face object.

use crate::algs::lattice::{coarsen, is_aligned};
use crate::amr_error::AmrError;
use crate::topology::block::BlockId;
use crate::topology::face::{BlockFace, SharedFace};
use crate::topology::region::Face;
use crate::topology::registry::BlockRegistry;
use parking_lot::Mutex;
use std::sync::Arc;

/// The face of a coarser neighbor that `face` of block `id` lies on, if any.
///
/// The finest such level wins.
pub fn find_existing_face(registry: &BlockRegistry, id: BlockId, face: Face) -> Option<SharedFace> {
    let block = registry.block(id);
    let level = block.level();
    let grid = block.grid_index();
    let a = face.axis;
    let edge = if face.positive { grid[a] + 1 } else { grid[a] };
    let step = face.step();
    (0..level).rev().find_map(|lower| {
        let diff = level - lower;
        if !is_aligned(edge, diff) {
            return None;
        }
        let cell = std::array::from_fn(|i| coarsen(grid[i] + step[i], diff));
        registry
            .block_at(lower, cell)
            .and_then(|n| n.face(face.reversed()))
            .cloned()
    })
}

fn same_level_face(registry: &BlockRegistry, id: BlockId, face: Face) -> Option<SharedFace> {
    let block = registry.block(id);
    let step = face.step();
    let cell = std::array::from_fn(|i| block.grid_index()[i] + step[i]);
    registry
        .block_at(block.level(), cell)
        .and_then(|n| n.face(face.reversed()))
        .cloned()
}

/// Attach all six faces of one block. Returns the number of new faces.
fn create_block_faces(registry: &mut BlockRegistry, id: BlockId) -> Result<usize, AmrError> {
    let dims = registry.metadata()?.standard_block_dimensions;
    let mut created = 0;
    for face in Face::all() {
        let shared = match find_existing_face(registry, id, face)
            .or_else(|| same_level_face(registry, id, face))
        {
            Some(shared) => shared,
            None => {
                let b = registry.block(id);
                let interior = b.origin_index().map(|o| o + 1);
                created += 1;
                Arc::new(Mutex::new(BlockFace::for_block(b.level(), interior, dims, face)))
            }
        };
        registry.block_mut(id).set_face(face, shared);
    }
    Ok(created)
}

/// Build faces for every block of the registry. Returns the number of
/// distinct faces created.
pub fn create_faces(registry: &mut BlockRegistry) -> Result<usize, AmrError> {
    let mut created = 0;
    for level in 0..registry.number_of_levels() {
        let order: Vec<BlockId> = match registry.level(level) {
            Some(l) => l.iter_grid().map(|(_, id)| id).collect(),
            None => continue,
        };
        for id in order {
            created += create_block_faces(registry, id)?;
        }
    }
    log::debug!("[faces] {created} faces created");
    Ok(created)
}
