//! Runs under plain `cargo test` as a one-rank world, or under `mpirun` with
//! every rank contributing the same layout slice.
#![cfg(feature = "mpi-support")]

use amr_dualgrid::prelude::*;
use serial_test::serial;

mod util;

#[test]
#[serial]
fn mpi_pass_completes_on_every_rank() {
    let Some(comm) = MpiComm::new() else {
        return;
    };
    let (rank, size) = (comm.rank(), comm.size());
    let blocks: Vec<RawBlock> = util::coarse_with_fine_face()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % size == rank)
        .map(|(_, b)| b)
        .collect();
    let mut helper = DualGridHelper::new(comm, ReconcileConfig::for_array("vf"));
    let report = helper.reconcile(blocks).unwrap().clone();
    assert_eq!(helper.number_of_blocks_in_level(0), 1);
    assert_eq!(helper.number_of_blocks_in_level(1), 4);
    assert!(!report.is_degraded());

    let meta = *helper.metadata().unwrap();
    for b in helper.registry().blocks().iter().filter(|b| b.has_payload() && b.level() == 1) {
        util::assert_snapped(&meta, b);
    }
}

fn world_shape<C: Communicator>(comm: &C) -> (usize, usize) {
    (comm.rank(), comm.size())
}

#[test]
#[serial]
fn mpi_comm_drives_the_crate_communicator() {
    let Some(comm) = MpiComm::new() else {
        return;
    };
    let (rank, size) = world_shape(&comm);
    assert!(rank < size);
    let peer = (rank + 1) % size;
    let from = (rank + size - 1) % size;
    let tag = CommTag::new(0x4d50);
    comm.send(peer, tag, &[rank as u8]);
    assert_eq!(comm.recv_exact(from, tag, 1).unwrap(), vec![from as u8]);
}
