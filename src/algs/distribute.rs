// src/algs/distribute.rs

//! Block skeleton exchange.
//!
//! Every rank must see every block (level, grid index and owner, but no
//! voxels) before ownership can be resolved. Rank 0 collects the local
//! blocks of every other rank, then sends each rank the blocks it does not
//! already own. Each message is a [`WireCount`] followed by that many
//! [`WireBlockRecord`]s.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireBlockRecord, WireCount, cast_slice, decode_records};
use crate::amr_error::AmrError;
use crate::topology::registry::BlockRegistry;
use std::mem::size_of;

const GATHER_TAG: CommTag = CommTag::new(0x5b00);
const SCATTER_TAG: CommTag = CommTag::new(0x5b10);

fn send_records<C: Communicator>(comm: &C, peer: usize, tag: CommTag, records: &[WireBlockRecord]) {
    let count = WireCount::new(records.len());
    comm.send(peer, tag, cast_slice(std::slice::from_ref(&count)));
    comm.send(peer, tag.offset(1), cast_slice(records));
}

fn recv_records<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
) -> Result<Vec<WireBlockRecord>, AmrError> {
    let header = comm.recv_exact(peer, tag, size_of::<WireCount>())?;
    let n = decode_records::<WireCount>(&header)?
        .first()
        .map(WireCount::get)
        .unwrap_or(0);
    let body = comm.recv_exact(peer, tag.offset(1), n * size_of::<WireBlockRecord>())?;
    decode_records(&body)
}

/// Records of the blocks in `registry` that satisfy `keep`, level by level.
fn collect_records(registry: &BlockRegistry, keep: impl Fn(usize) -> bool) -> Vec<WireBlockRecord> {
    registry
        .levels()
        .iter()
        .flat_map(|level| level.blocks().iter())
        .map(|&id| registry.block(id))
        .filter(|b| keep(b.owner()))
        .map(|b| WireBlockRecord::new(b.level(), b.owner(), b.grid_index()))
        .collect()
}

/// Collective: complete every rank's registry with skeletons of all remote
/// blocks. A no-op on a single rank.
pub fn share_blocks<C: Communicator>(
    registry: &mut BlockRegistry,
    comm: &C,
) -> Result<(), AmrError> {
    let (rank, size) = (comm.rank(), comm.size());
    if size <= 1 {
        return Ok(());
    }

    if rank != 0 {
        let mine = collect_records(registry, |owner| owner == rank);
        log::debug!("[distribute] rank {rank}: sending {} blocks to rank 0", mine.len());
        send_records(comm, 0, GATHER_TAG, &mine);
        let remote = recv_records(comm, 0, SCATTER_TAG)?;
        for rec in &remote {
            registry.add_grid_block(rec.level(), rec.grid(), rec.owner(), None)?;
        }
        log::debug!("[distribute] rank {rank}: received {} skeletons", remote.len());
        return Ok(());
    }

    for peer in 1..size {
        let remote = recv_records(comm, peer, GATHER_TAG)?;
        log::debug!("[distribute] rank 0: {} blocks from rank {peer}", remote.len());
        for rec in &remote {
            registry.add_grid_block(rec.level(), rec.grid(), peer, None)?;
        }
    }
    for peer in 1..size {
        let theirs = collect_records(registry, |owner| owner != peer);
        send_records(comm, peer, SCATTER_TAG, &theirs);
    }
    log::info!(
        "[distribute] {} blocks in {} levels shared with {} ranks",
        registry.number_of_blocks(),
        registry.number_of_levels(),
        size - 1
    );
    Ok(())
}
