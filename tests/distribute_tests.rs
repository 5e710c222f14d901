use amr_dualgrid::DebugInvariants;
use amr_dualgrid::algs::distribute::share_blocks;
use amr_dualgrid::algs::metadata::compute_global_metadata;
use amr_dualgrid::prelude::*;

mod util;

/// Blocks of a 2x2x1 coarse layout plus two fine blocks, dealt round-robin.
fn dealt(rank: usize, size: usize) -> Vec<RawBlock> {
    let mut all = Vec::new();
    for j in 0..2 {
        for i in 0..2 {
            all.push(util::field_block(0, [i, j, 0]));
        }
    }
    all.push(util::field_block(1, [4, 0, 0]));
    all.push(util::field_block(1, [4, 1, 0]));
    all.into_iter()
        .enumerate()
        .filter(|(i, _)| i % size == rank)
        .map(|(_, b)| b)
        .collect()
}

fn registry_after_share(comm: &LocalComm) -> BlockRegistry {
    let (rank, size) = (comm.rank(), comm.size());
    let blocks = dealt(rank, size);
    let meta = compute_global_metadata(&blocks, comm).unwrap();
    let mut reg = BlockRegistry::with_metadata(rank, meta);
    for b in blocks {
        reg.add_block(b).unwrap();
    }
    share_blocks(&mut reg, comm).unwrap();
    reg
}

/// `(level, grid, owner)` of every block, sorted.
fn layout(reg: &BlockRegistry) -> Vec<(usize, [i64; 3], usize)> {
    let mut v: Vec<_> = reg
        .blocks()
        .iter()
        .map(|b| (b.level(), b.grid_index(), b.owner()))
        .collect();
    v.sort();
    v
}

#[test]
fn every_rank_sees_every_block() {
    let regs = util::run_ranks(3, |comm| registry_after_share(&comm));
    let expected = layout(&regs[0]);
    assert_eq!(expected.len(), 6);
    for (rank, reg) in regs.iter().enumerate() {
        assert_eq!(layout(reg), expected, "rank {rank}");
        assert_eq!(reg.number_of_blocks_in_level(0), 4);
        assert_eq!(reg.number_of_blocks_in_level(1), 2);
        assert_eq!(reg.validate_invariants(), Ok(()));
    }
}

#[test]
fn only_owned_blocks_carry_voxels() {
    let regs = util::run_ranks(3, |comm| registry_after_share(&comm));
    for (rank, reg) in regs.iter().enumerate() {
        assert_eq!(reg.number_of_local_blocks(), 2);
        for b in reg.blocks() {
            assert_eq!(b.has_payload(), b.owner() == rank, "rank {rank} block {:?}", b.grid_index());
        }
    }
}

#[test]
fn skeletons_sit_on_the_block_lattice() {
    let regs = util::run_ranks(2, |comm| registry_after_share(&comm));
    for reg in &regs {
        let meta = reg.metadata().unwrap();
        for b in reg.blocks() {
            assert_eq!(b.origin_index(), meta.skeleton_origin_index(b.grid_index()));
        }
    }
}

#[test]
fn single_rank_share_is_a_no_op() {
    let reg = util::run_ranks(1, |comm| registry_after_share(&comm)).remove(0);
    assert_eq!(reg.number_of_blocks(), 6);
    assert_eq!(reg.number_of_local_blocks(), 6);
}
