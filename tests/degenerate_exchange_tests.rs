use amr_dualgrid::algs::degenerate::copy_block_to_block;
use amr_dualgrid::algs::metadata::compute_global_metadata;
use amr_dualgrid::prelude::*;
use std::collections::BTreeMap;

mod util;

type Payloads = BTreeMap<(usize, [i64; 3]), ScalarArray>;

/// Coarse block on rank 0; the fine blocks dealt over the other ranks.
fn dealt(rank: usize, size: usize) -> Vec<RawBlock> {
    let mut blocks = util::coarse_with_fine_face().into_iter();
    let coarse = blocks.next().into_iter().filter(|_| rank == 0);
    let fine = blocks
        .enumerate()
        .filter(|(i, _)| size == 1 || 1 + i % (size - 1) == rank)
        .map(|(_, b)| b);
    coarse.chain(fine).collect()
}

fn local_payloads(reg: &BlockRegistry) -> Payloads {
    reg.blocks()
        .iter()
        .filter_map(|b| Some(((b.level(), b.grid_index()), b.payload()?.clone())))
        .collect()
}

fn parallel(size: usize, config: ReconcileConfig) -> Vec<(Payloads, ReconcileReport)> {
    util::run_ranks(size, |comm| {
        let rank = comm.rank();
        let mut helper = DualGridHelper::new(comm, config.clone());
        let report = helper.reconcile(dealt(rank, size)).unwrap().clone();
        (local_payloads(helper.registry()), report)
    })
}

#[test]
fn cross_rank_copies_match_the_serial_pass() {
    let config = ReconcileConfig::for_array("vf");
    let mut serial = DualGridHelper::new(NoComm, config.clone());
    serial.reconcile(dealt(0, 1)).unwrap();
    let expected = local_payloads(serial.registry());
    assert_eq!(expected.len(), 5);

    let ranks = parallel(3, config);
    let mut merged = Payloads::new();
    for (payloads, _) in &ranks {
        merged.extend(payloads.clone());
    }
    assert_eq!(merged, expected);

    let sent: usize = ranks.iter().map(|(_, r)| r.remote_regions_sent).sum();
    let received: usize = ranks.iter().map(|(_, r)| r.remote_regions_received).sum();
    let bytes_out: usize = ranks.iter().map(|(_, r)| r.bytes_sent).sum();
    let bytes_in: usize = ranks.iter().map(|(_, r)| r.bytes_received).sum();
    assert!(sent > 0);
    assert_eq!(sent, received);
    assert_eq!(bytes_out, bytes_in);
    // Only the coarse rank sources data.
    assert_eq!(ranks[0].1.remote_regions_sent, sent);
    assert!(ranks.iter().all(|(_, r)| !r.is_degraded()));
}

#[test]
fn snapped_ghosts_hold_coarse_values_on_every_rank() {
    let checked = util::run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut helper = DualGridHelper::new(comm, ReconcileConfig::for_array("vf"));
        helper.reconcile(dealt(rank, 2)).unwrap();
        let meta = *helper.metadata().unwrap();
        helper
            .registry()
            .blocks()
            .iter()
            .filter(|b| b.has_payload() && b.level() == 1)
            .map(|b| util::assert_snapped(&meta, b))
            .sum::<usize>()
    });
    assert_eq!(checked[0], 0);
    assert!(checked[1] > 0);
}

#[test]
fn length_headers_agree_with_derived_lengths() {
    let config = ReconcileConfig {
        verify_message_lengths: true,
        ..ReconcileConfig::for_array("vf")
    };
    let plain = parallel(3, ReconcileConfig::for_array("vf"));
    let checked = parallel(3, config);
    for ((a, ra), (b, rb)) in plain.iter().zip(&checked) {
        assert_eq!(a, b);
        assert_eq!(ra.bytes_received, rb.bytes_received);
    }
}

#[test]
fn skip_ghost_copy_sends_nothing() {
    let config = ReconcileConfig {
        skip_ghost_copy: true,
        ..ReconcileConfig::for_array("vf")
    };
    for (rank, (payloads, report)) in parallel(3, config).into_iter().enumerate() {
        assert_eq!(report.bytes_sent + report.bytes_received, 0);
        assert_eq!(report.queued_copies, 0);
        let inputs = dealt(rank, 3);
        assert_eq!(payloads.len(), inputs.len());
        let originals: Vec<&ScalarArray> = inputs.iter().map(|b| &b.cells).collect();
        assert!(payloads.values().all(|p| originals.contains(&p)));
    }
}

#[test]
fn repeating_a_local_copy_changes_nothing() {
    let blocks = util::coarse_with_fine_face();
    let mut reg = BlockRegistry::new(0);
    reg.set_metadata(compute_global_metadata(&blocks, &NoComm).unwrap());
    let ids: Vec<BlockId> = blocks.into_iter().map(|b| reg.add_block(b).unwrap()).collect();
    let (coarse, fine) = (ids[0], ids[1]);
    let before = reg.block(fine).payload().unwrap().clone();

    for region in Region::all().filter(|r| r.offset(0) == -1) {
        assert!(copy_block_to_block(&mut reg, coarse, fine, region).unwrap());
        let once = reg.block(fine).payload().unwrap().clone();
        assert!(copy_block_to_block(&mut reg, coarse, fine, region).unwrap());
        assert_eq!(reg.block(fine).payload().unwrap(), &once, "region {:?}", region.offsets());
    }
    assert_ne!(reg.block(fine).payload().unwrap(), &before);
    // The source is never written.
    assert_eq!(reg.block(coarse).payload().unwrap(), &util::field_block(0, [0, 0, 0]).cells);
}

#[test]
fn mistyped_remote_source_leaves_receiving_ghosts_alone() {
    // Rank 0 holds the f64 fine blocks and decides the type; rank 1 sends f32.
    let inputs = util::coarse_with_fine_face();
    let fine: Vec<RawBlock> = inputs[1..].to_vec();
    let coarse = util::narrowed(&inputs[0]);
    let ranks = util::run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut helper = DualGridHelper::new(comm, ReconcileConfig::for_array("vf"));
        let blocks = if rank == 0 { fine.clone() } else { vec![coarse.clone()] };
        let report = helper.reconcile(blocks).unwrap().clone();
        assert_eq!(helper.metadata().unwrap().scalar_type, ScalarType::F64);
        (local_payloads(helper.registry()), report)
    });

    let (payloads, report) = &ranks[0];
    assert_eq!(payloads.len(), 4);
    let originals: Vec<&ScalarArray> = fine.iter().map(|b| &b.cells).collect();
    assert!(payloads.values().all(|p| originals.contains(&p)));
    assert!(report.remote_regions_received > 0);
    assert_eq!(report.type_mismatches, report.remote_regions_received);
    assert!(report.is_degraded());

    let (_, sender) = &ranks[1];
    assert_eq!(sender.type_mismatches, sender.remote_regions_sent);
    assert_eq!(sender.bytes_sent, report.bytes_received);
}

#[test]
fn reconciling_twice_gives_the_same_result() {
    let run = || {
        util::run_ranks(2, |comm| {
            let rank = comm.rank();
            let mut helper = DualGridHelper::new(comm, ReconcileConfig::for_array("vf"));
            let first = helper.reconcile(dealt(rank, 2)).unwrap().clone();
            let first_payloads = local_payloads(helper.registry());
            let second = helper.reconcile(dealt(rank, 2)).unwrap().clone();
            (first == second, first_payloads == local_payloads(helper.registry()))
        })
    };
    assert!(run().into_iter().all(|(r, p)| r && p));
}
