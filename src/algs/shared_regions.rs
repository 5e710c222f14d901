//! Shared-region ownership resolution.
//!
//! Levels are visited finest first and blocks in grid order, so every rank
//! that holds the same skeleton makes the same decisions without talking to
//! anyone. The first block to visit a region owns it and every neighbor
//! touching the region cedes it. The owner still snaps the region to the
//! coarsest neighbor closest to it, which makes the region degenerate and
//! schedules a ghost copy from that neighbor.

use crate::algs::degenerate::{DegenerateQueue, DegenerateRegionCopy, copy_block_to_block, note_region_error};
use crate::algs::lattice::{coarsen, is_aligned};
use crate::amr_error::AmrError;
use crate::config::{ReconcileConfig, TieBreak};
use crate::report::ReconcileReport;
use crate::topology::block::{BlockId, RegionOwnership};
use crate::topology::region::Region;
use crate::topology::registry::BlockRegistry;
use itertools::iproduct;

/// The block a region snaps to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Claim {
    pub block: BlockId,
    pub level: usize,
    /// Squared distance of the claimant's center from the region.
    pub distance: i32,
}

/// Neighbor offsets that touch `region`, sorted so every loop counts up.
fn neighbor_range(offset: i8) -> std::ops::RangeInclusive<i64> {
    match offset {
        o if o < 0 => i64::from(o)..=0,
        o => 0..=i64::from(o),
    }
}

/// A region can only meet a block `diff` levels coarser where it lies on
/// that level's block lattice.
fn on_coarse_boundary(grid: [i64; 3], region: Region, diff: usize) -> bool {
    (0..3).any(|a| match region.offset(a) {
        -1 => is_aligned(grid[a], diff),
        1 => is_aligned(grid[a] + 1, diff),
        _ => false,
    })
}

/// Decide which block `region` of `id` snaps to, clearing boundary bits
/// between touching blocks and ceding the region on every neighbor.
pub fn claim_block_shared_region(
    registry: &mut BlockRegistry,
    id: BlockId,
    region: Region,
    config: &ReconcileConfig,
) -> Claim {
    let (level, grid) = {
        let b = registry.block(id);
        (b.level(), b.grid_index())
    };
    let r = region.offsets().map(i64::from);
    let mut best = Claim {
        block: id,
        level,
        distance: region.distance(),
    };

    for lower in (0..=level).rev() {
        let diff = level - lower;
        if !on_coarse_boundary(grid, region, diff) {
            continue;
        }
        let ranges = region.offsets().map(neighbor_range);
        for (iz, iy, ix) in iproduct!(ranges[2].clone(), ranges[1].clone(), ranges[0].clone()) {
            if ix == 0 && iy == 0 && iz == 0 {
                continue;
            }
            let step = [ix, iy, iz];
            let cell = std::array::from_fn(|a| coarsen(grid[a] + step[a], diff));
            let Some(nid) = registry.block_id_at(lower, cell) else {
                continue;
            };
            let (block, neighbor) = registry.pair_mut(id, nid);

            let face_step = Region::new(ix as i8, iy as i8, iz as i8);
            if let Some(face) = face_step.face() {
                block.boundary.clear(face);
                neighbor.boundary.clear(face.reversed());
            }

            if !config.enable_degenerate_cells {
                continue;
            }
            let mirrored = Region::from_offsets(std::array::from_fn(|a| (r[a] - 2 * step[a]) as i8));
            neighbor.set_region(mirrored, RegionOwnership::Ceded);

            let distance: i32 = (0..3).map(|a| ((r[a] - step[a]) * (r[a] - step[a])) as i32).sum();
            let better = distance < best.distance
                || (config.tie_break == TieBreak::LowestLevel
                    && distance == best.distance
                    && best.block != id
                    && lower < best.level);
            if better {
                best = Claim {
                    block: nid,
                    level: lower,
                    distance,
                };
            }
        }
    }
    best
}

fn assign_block_shared_regions(
    registry: &mut BlockRegistry,
    id: BlockId,
    config: &ReconcileConfig,
    queue: &mut DegenerateQueue,
    report: &mut ReconcileReport,
) {
    let level = registry.block(id).level();
    for region in Region::all() {
        if !registry.block(id).owns_region(region) {
            continue;
        }
        let claim = claim_block_shared_region(registry, id, region, config);
        if !config.enable_degenerate_cells || claim.level >= level {
            continue;
        }
        let state = match RegionOwnership::degenerate((level - claim.level) as u32) {
            Ok(state) => state,
            Err(err) => {
                let b = registry.block(id);
                log::error!(
                    "[regions] block {:?} at level {level}, region {:?}: {err}",
                    b.grid_index(),
                    region.offsets()
                );
                report.encoding_overflows += 1;
                continue;
            }
        };
        registry.block_mut(id).set_region(region, state);
        if config.skip_ghost_copy {
            continue;
        }
        let entry = DegenerateRegionCopy {
            source: claim.block,
            receiving: id,
            region,
        };
        if registry.block(id).has_payload() && registry.block(claim.block).has_payload() {
            match copy_block_to_block(registry, claim.block, id, region) {
                Ok(true) => report.local_copies += 1,
                Ok(false) => {}
                Err(err) => note_region_error(report, &entry, &err),
            }
        } else {
            queue.push(entry);
            report.queued_copies += 1;
        }
    }
}

/// Resolve ownership of every shared region in the registry, finest level
/// first. Local copies happen immediately; the rest land in `queue`.
pub fn assign_shared_regions(
    registry: &mut BlockRegistry,
    config: &ReconcileConfig,
    queue: &mut DegenerateQueue,
    report: &mut ReconcileReport,
) -> Result<(), AmrError> {
    registry.metadata()?;
    for level in (0..registry.number_of_levels()).rev() {
        let order: Vec<BlockId> = match registry.level(level) {
            Some(l) => l.iter_grid().map(|(_, id)| id).collect(),
            None => continue,
        };
        for id in order {
            assign_block_shared_regions(registry, id, config, queue, report);
        }
    }
    log::info!(
        "[regions] {} local copies, {} queued, {} encoding overflows",
        report.local_copies,
        report.queued_copies,
        report.encoding_overflows
    );
    Ok(())
}
