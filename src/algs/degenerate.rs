//! Degenerate-region data mover.
//!
//! A degenerate region is a ghost region of a fine block whose values must
//! be snapped to the coarser block that owns it. Pairs of local blocks are
//! copied directly; every other pair waits in a [`DegenerateQueue`] until the
//! pairwise exchange in [`process_degenerate_queue`].
//!
//! The queue is built by a replicated, deterministic traversal, so every
//! rank filters the same entries in the same order for a given pair of
//! ranks. Message lengths are therefore derived on both ends from geometry
//! alone; only the optional length check puts a header on the wire. Each
//! region is framed by a status byte so a region the sender could not
//! gather is skipped on the receiving side instead of overwriting ghosts.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::lattice::coarsen;
use crate::algs::metadata::GlobalMetadata;
use crate::algs::wire::{WireCount, cast_slice, decode_records};
use crate::amr_error::AmrError;
use crate::config::ReconcileConfig;
use crate::data::scalar::{Scalar, ScalarArray};
use crate::dispatch_scalar;
use crate::report::ReconcileReport;
use crate::topology::block::BlockId;
use crate::topology::region::Region;
use crate::topology::registry::BlockRegistry;
use std::mem::size_of;

const DATA_TAG: CommTag = CommTag::new(0x6d00);
const LENGTH_TAG: CommTag = CommTag::new(0x6d01);

/// Status byte ahead of every packed region. A region whose status is not
/// `REGION_OK` carries zeros and is skipped by the receiver.
const REGION_OK: u8 = 0;
const REGION_TYPE_MISMATCH: u8 = 1;
const REGION_UNAVAILABLE: u8 = 2;

/// A pending copy of `source` values into the `region` ghost voxels of
/// `receiving`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DegenerateRegionCopy {
    pub source: BlockId,
    pub receiving: BlockId,
    pub region: Region,
}

/// Copies deferred to the cross-rank exchange, in traversal order.
#[derive(Clone, Debug, Default)]
pub struct DegenerateQueue {
    entries: Vec<DegenerateRegionCopy>,
}

impl DegenerateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DegenerateRegionCopy) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DegenerateRegionCopy> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a DegenerateQueue {
    type Item = &'a DegenerateRegionCopy;
    type IntoIter = std::slice::Iter<'a, DegenerateRegionCopy>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Inclusive voxel extent `[x0, x1, y0, y1, z0, z1]` of `region` inside a
/// ghosted block with interior `dims`: a single ghost layer for a `±1`
/// offset, the interior span for `0`.
pub fn receiving_extent(dims: [i64; 3], region: Region) -> [i64; 6] {
    let mut ext = [0i64; 6];
    for a in 0..3 {
        let (lo, hi) = (0, dims[a] + 1);
        let (x0, x1) = match region.offset(a) {
            -1 => (lo, lo),
            0 => (lo + 1, hi - 1),
            _ => (hi, hi),
        };
        ext[2 * a] = x0;
        ext[2 * a + 1] = x1;
    }
    ext
}

/// Map a receiving extent onto the voxels of a block `diff` levels coarser.
pub fn source_extent(
    receiving: [i64; 6],
    high_origin: [i64; 3],
    low_origin: [i64; 3],
    diff: usize,
) -> [i64; 6] {
    std::array::from_fn(|i| {
        let a = i / 2;
        coarsen(receiving[i] + high_origin[a], diff) - low_origin[a]
    })
}

fn extent_volume(ext: [i64; 6]) -> usize {
    (0..3)
        .map(|a| (ext[2 * a + 1] - ext[2 * a] + 1).max(0) as usize)
        .product()
}

/// Geometry of one degenerate copy, identical on every rank.
#[derive(Clone, Debug)]
struct RegionCopy {
    diff: usize,
    high_origin: [i64; 3],
    low_origin: [i64; 3],
    ghosted: [i64; 3],
    dst_ext: [i64; 6],
    src_ext: [i64; 6],
}

impl RegionCopy {
    /// `None` when there is nothing to snap (same level, or a source that is
    /// finer than the receiver).
    fn plan(
        meta: &GlobalMetadata,
        registry: &BlockRegistry,
        entry: &DegenerateRegionCopy,
    ) -> Result<Option<Self>, AmrError> {
        let src = registry.block(entry.source);
        let dst = registry.block(entry.receiving);
        if src.level() == dst.level() {
            return Ok(None);
        }
        if src.level() > dst.level() {
            log::warn!(
                "[degenerate] reverse level change: source level {} above receiving level {}",
                src.level(),
                dst.level()
            );
            return Ok(None);
        }
        let ghosted = meta.standard_block_dimensions.map(|d| d + 2);
        let diff = dst.level() - src.level();
        let dst_ext = receiving_extent(meta.standard_block_dimensions, entry.region);
        let src_ext = source_extent(dst_ext, dst.origin_index(), src.origin_index(), diff);
        if (0..3).any(|a| src_ext[2 * a] < 0 || src_ext[2 * a + 1] >= ghosted[a]) {
            return Err(AmrError::RegionOutOfBounds {
                region: entry.region.offsets(),
            });
        }
        Ok(Some(Self {
            diff,
            high_origin: dst.origin_index(),
            low_origin: src.origin_index(),
            ghosted,
            dst_ext,
            src_ext,
        }))
    }

    fn source_len(&self) -> usize {
        extent_volume(self.src_ext)
    }

    fn low(&self, v: i64, a: usize) -> i64 {
        coarsen(v + self.high_origin[a], self.diff) - self.low_origin[a]
    }

    /// Offset of a coarse voxel inside the source block.
    fn block_offset(&self, l: [i64; 3]) -> usize {
        (l[0] + self.ghosted[0] * (l[1] + self.ghosted[1] * l[2])) as usize
    }

    /// Offset of a coarse voxel inside a packed message region.
    fn message_offset(&self, l: [i64; 3]) -> usize {
        let e = self.src_ext;
        let nx = e[1] - e[0] + 1;
        let ny = e[3] - e[2] + 1;
        ((l[0] - e[0]) + nx * ((l[1] - e[2]) + ny * (l[2] - e[4]))) as usize
    }

    /// Source values of the region, x fastest.
    fn gather<T: Scalar>(&self, src: &[T], out: &mut Vec<T>) {
        let e = self.src_ext;
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    out.push(src[self.block_offset([x, y, z])]);
                }
            }
        }
    }

    /// Overwrite the receiving voxels with `fetch(low-resolution index)`.
    fn scatter<T: Scalar>(&self, dst: &mut [T], fetch: impl Fn([i64; 3]) -> T) {
        let e = self.dst_ext;
        let g = self.ghosted;
        for z in e[4]..=e[5] {
            let lz = self.low(z, 2);
            for y in e[2]..=e[3] {
                let ly = self.low(y, 1);
                for x in e[0]..=e[1] {
                    let lx = self.low(x, 0);
                    dst[(x + g[0] * (y + g[1] * z)) as usize] = fetch([lx, ly, lz]);
                }
            }
        }
    }
}

fn typed<T: Scalar>(array: &ScalarArray) -> Result<&[T], AmrError> {
    let found = array.scalar_type();
    array.as_slice::<T>().ok_or(AmrError::TypeMismatch {
        expected: T::TYPE,
        found,
    })
}

fn typed_mut<T: Scalar>(array: &mut ScalarArray) -> Result<&mut [T], AmrError> {
    let found = array.scalar_type();
    array.as_mut_slice::<T>().ok_or(AmrError::TypeMismatch {
        expected: T::TYPE,
        found,
    })
}

fn check_len(meta: &GlobalMetadata, array: &ScalarArray) -> Result<(), AmrError> {
    if array.len() != meta.ghosted_len() {
        return Err(AmrError::PayloadLengthMismatch {
            expected: meta.ghosted_len(),
            found: array.len(),
        });
    }
    Ok(())
}

/// Copy a degenerate region between two blocks that both hold payloads on
/// this rank. Returns `false` when the pair needs no copy.
pub fn copy_block_to_block(
    registry: &mut BlockRegistry,
    source: BlockId,
    receiving: BlockId,
    region: Region,
) -> Result<bool, AmrError> {
    let meta = *registry.metadata()?;
    let entry = DegenerateRegionCopy {
        source,
        receiving,
        region,
    };
    let Some(plan) = RegionCopy::plan(&meta, registry, &entry)? else {
        return Ok(false);
    };
    let (dst_block, src_block) = registry.pair_mut(receiving, source);
    let src = src_block.payload.as_ref().ok_or(AmrError::MissingPayload {
        level: src_block.level,
        grid_index: src_block.grid_index,
    })?;
    let dst = dst_block.payload.as_mut().ok_or(AmrError::MissingPayload {
        level: dst_block.level,
        grid_index: dst_block.grid_index,
    })?;
    check_len(&meta, src)?;
    check_len(&meta, dst)?;
    dispatch_scalar!(dst.scalar_type(), T => {
        let s = typed::<T>(src)?;
        let d = typed_mut::<T>(dst)?;
        plan.scatter(d, |l| s[plan.block_offset(l)]);
    });
    Ok(true)
}

/// Record a per-region failure in the report.
pub(crate) fn note_region_error(report: &mut ReconcileReport, entry: &DegenerateRegionCopy, err: &AmrError) {
    log::error!(
        "[degenerate] region {:?} of block {:?} from block {:?} skipped: {err}",
        entry.region.offsets(),
        entry.receiving,
        entry.source
    );
    match err {
        AmrError::TypeMismatch { .. } => report.type_mismatches += 1,
        _ => report.skipped_copies += 1,
    }
}

fn pairs_with<'a>(
    registry: &'a BlockRegistry,
    queue: &'a DegenerateQueue,
    source_rank: usize,
    receiving_rank: usize,
) -> impl Iterator<Item = &'a DegenerateRegionCopy> + 'a {
    queue.iter().filter(move |e| {
        registry.block(e.source).owner() == source_rank
            && registry.block(e.receiving).owner() == receiving_rank
    })
}

/// Pack every queued region this rank sources for `peer`.
fn pack_regions(
    meta: &GlobalMetadata,
    registry: &BlockRegistry,
    queue: &DegenerateQueue,
    peer: usize,
    report: &mut ReconcileReport,
) -> Vec<u8> {
    let width = meta.scalar_type.size_of();
    let mut buf = Vec::new();
    for entry in pairs_with(registry, queue, registry.local_rank(), peer) {
        let plan = match RegionCopy::plan(meta, registry, entry) {
            Ok(Some(plan)) => plan,
            Ok(None) => continue,
            Err(err) => {
                note_region_error(report, entry, &err);
                continue;
            }
        };
        buf.push(REGION_OK);
        let start = buf.len();
        let packed = registry
            .block(entry.source)
            .payload()
            .ok_or_else(|| {
                let b = registry.block(entry.source);
                AmrError::MissingPayload {
                    level: b.level(),
                    grid_index: b.grid_index(),
                }
            })
            .and_then(|src| {
                check_len(meta, src)?;
                dispatch_scalar!(meta.scalar_type, T => {
                    let s = typed::<T>(src)?;
                    let mut values = Vec::with_capacity(plan.source_len());
                    plan.gather(s, &mut values);
                    buf.extend_from_slice(bytemuck::cast_slice(&values));
                });
                Ok(())
            });
        if let Err(err) = packed {
            // Keep the frame intact for the regions that follow.
            note_region_error(report, entry, &err);
            buf[start - 1] = match err {
                AmrError::TypeMismatch { .. } => REGION_TYPE_MISMATCH,
                _ => REGION_UNAVAILABLE,
            };
            buf.resize(start + plan.source_len() * width, 0);
        }
        report.remote_regions_sent += 1;
    }
    buf
}

/// Length in bytes of the message this rank expects from `peer`.
fn expected_len(
    meta: &GlobalMetadata,
    registry: &BlockRegistry,
    queue: &DegenerateQueue,
    peer: usize,
) -> usize {
    pairs_with(registry, queue, peer, registry.local_rank())
        .filter_map(|entry| RegionCopy::plan(meta, registry, entry).ok().flatten())
        .map(|plan| 1 + plan.source_len() * meta.scalar_type.size_of())
        .sum()
}

/// Unpack a message from `peer` into the receiving blocks, in queue order.
fn unpack_regions(
    meta: &GlobalMetadata,
    registry: &mut BlockRegistry,
    queue: &DegenerateQueue,
    peer: usize,
    message: &[u8],
    report: &mut ReconcileReport,
) {
    let width = meta.scalar_type.size_of();
    let mut cursor = 0usize;
    let local = registry.local_rank();
    let entries: Vec<DegenerateRegionCopy> = pairs_with(registry, queue, peer, local).copied().collect();
    for entry in &entries {
        let plan = match RegionCopy::plan(meta, registry, entry) {
            Ok(Some(plan)) => plan,
            Ok(None) => continue,
            Err(err) => {
                note_region_error(report, entry, &err);
                continue;
            }
        };
        let n_bytes = 1 + plan.source_len() * width;
        let Some((&status, chunk)) = message
            .get(cursor..cursor + n_bytes)
            .and_then(<[u8]>::split_first)
        else {
            log::error!("[degenerate] message from rank {peer} ends before region {:?}", entry.region.offsets());
            report.skipped_copies += 1;
            break;
        };
        cursor += n_bytes;
        report.remote_regions_received += 1;
        if status != REGION_OK {
            log::error!(
                "[degenerate] rank {peer} could not source region {:?} of block {:?}; ghosts left as they were",
                entry.region.offsets(),
                entry.receiving
            );
            match status {
                REGION_TYPE_MISMATCH => report.type_mismatches += 1,
                _ => report.skipped_copies += 1,
            }
            continue;
        }

        let dst_block = registry.block_mut(entry.receiving);
        let (level, grid_index) = (dst_block.level, dst_block.grid_index);
        let applied = dst_block
            .payload
            .as_mut()
            .ok_or(AmrError::MissingPayload { level, grid_index })
            .and_then(|dst| {
                check_len(meta, dst)?;
                dispatch_scalar!(meta.scalar_type, T => {
                    let d = typed_mut::<T>(dst)?;
                    let values: Vec<T> = bytemuck::pod_collect_to_vec(chunk);
                    plan.scatter(d, |l| values[plan.message_offset(l)]);
                });
                Ok(())
            });
        if let Err(err) = applied {
            note_region_error(report, entry, &err);
        }
    }
}

fn send_to<C: Communicator>(
    meta: &GlobalMetadata,
    registry: &BlockRegistry,
    queue: &DegenerateQueue,
    comm: &C,
    peer: usize,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) -> Result<(), AmrError> {
    let buf = pack_regions(meta, registry, queue, peer, report);
    log::debug!("[degenerate] rank {} -> {peer}: {} bytes", comm.rank(), buf.len());
    if config.verify_message_lengths {
        let header = WireCount::new(buf.len());
        comm.send(peer, LENGTH_TAG, cast_slice(std::slice::from_ref(&header)));
    }
    comm.send(peer, DATA_TAG, &buf);
    report.bytes_sent += buf.len();
    Ok(())
}

fn receive_from<C: Communicator>(
    meta: &GlobalMetadata,
    registry: &mut BlockRegistry,
    queue: &DegenerateQueue,
    comm: &C,
    peer: usize,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) -> Result<(), AmrError> {
    let expected = expected_len(meta, registry, queue, peer);
    if config.verify_message_lengths {
        let header = comm.recv_exact(peer, LENGTH_TAG, size_of::<WireCount>())?;
        let announced = decode_records::<WireCount>(&header)?
            .first()
            .map(WireCount::get)
            .unwrap_or(0);
        if announced != expected {
            return Err(AmrError::MessageLengthMismatch {
                neighbor: peer,
                expected,
                got: announced,
            });
        }
    }
    let message = comm.recv_exact(peer, DATA_TAG, expected)?;
    log::debug!("[degenerate] rank {} <- {peer}: {} bytes", comm.rank(), message.len());
    report.bytes_received += message.len();
    unpack_regions(meta, registry, queue, peer, &message, report);
    Ok(())
}

/// Collective: drain the queue with one message each way per pair of ranks.
///
/// Lower ranks send first and higher ranks receive first, so no two ranks
/// ever wait on each other's send.
pub fn process_degenerate_queue<C: Communicator>(
    registry: &mut BlockRegistry,
    queue: &DegenerateQueue,
    comm: &C,
    config: &ReconcileConfig,
    report: &mut ReconcileReport,
) -> Result<(), AmrError> {
    let (rank, size) = (comm.rank(), comm.size());
    if config.skip_ghost_copy || size <= 1 {
        return Ok(());
    }
    let meta = *registry.metadata()?;
    for peer in 0..size {
        if peer < rank {
            send_to(&meta, registry, queue, comm, peer, config, report)?;
            receive_from(&meta, registry, queue, comm, peer, config, report)?;
        } else if peer > rank {
            receive_from(&meta, registry, queue, comm, peer, config, report)?;
            send_to(&meta, registry, queue, comm, peer, config, report)?;
        }
    }
    log::info!(
        "[degenerate] rank {rank}: {} regions sent, {} received",
        report.remote_regions_sent,
        report.remote_regions_received
    );
    Ok(())
}
