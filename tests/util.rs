#![allow(dead_code)]
use amr_dualgrid::algs::degenerate::receiving_extent;
use amr_dualgrid::algs::lattice::coarsen;
use amr_dualgrid::prelude::*;

/// Interior cells per axis of every test block.
pub const DIMS: i64 = 4;

/// Value of the test field at level-lattice index `p`, as laid out in the
/// input frame (before the global origin is resolved).
pub fn field(level: usize, p: [i64; 3]) -> f64 {
    1.0e6 * level as f64 + p[0] as f64 + 100.0 * p[1] as f64 + 10_000.0 * p[2] as f64
}

/// Fully ghosted block at `grid` on `level`, root spacing 1 and origin 0,
/// filled with `fill(lattice index)` including its ghost layer.
pub fn ghosted_block(level: usize, grid: [i64; 3], fill: impl Fn([i64; 3]) -> f64) -> RawBlock {
    let spacing = 0.5f64.powi(level as i32);
    let lo: [i64; 3] = std::array::from_fn(|a| grid[a] * DIMS - 1);
    let extent: [i32; 6] = std::array::from_fn(|i| {
        let a = i / 2;
        (if i % 2 == 0 { lo[a] } else { lo[a] + DIMS + 2 }) as i32
    });
    let n = (DIMS + 2) as usize;
    let mut cells = Vec::with_capacity(n * n * n);
    for z in 0..n as i64 {
        for y in 0..n as i64 {
            for x in 0..n as i64 {
                cells.push(fill([lo[0] + x, lo[1] + y, lo[2] + z]));
            }
        }
    }
    RawBlock::new(level, [0.0; 3], [spacing; 3], extent, "vf", ScalarArray::from(cells))
        .expect("valid test block")
}

/// Ghosted block carrying [`field`].
pub fn field_block(level: usize, grid: [i64; 3]) -> RawBlock {
    ghosted_block(level, grid, |p| field(level, p))
}

/// The same block with its cells narrowed to `f32`.
pub fn narrowed(block: &RawBlock) -> RawBlock {
    let values: Vec<f32> = block
        .cells
        .as_slice::<f64>()
        .expect("f64 test block")
        .iter()
        .map(|&v| v as f32)
        .collect();
    RawBlock::new(
        block.level,
        block.origin,
        block.spacing,
        block.extent,
        "vf",
        ScalarArray::from(values),
    )
    .expect("valid test block")
}

/// Voxels the resolved origin moved the input frame by, at `level`.
pub fn lattice_shift(meta: &GlobalMetadata, level: usize) -> [i64; 3] {
    let s = meta.spacing(level);
    std::array::from_fn(|a| (-meta.global_origin[a] / s[a]).round() as i64)
}

/// Grid index a block built at input-frame `grid` ends up at.
pub fn placed(meta: &GlobalMetadata, level: usize, grid: [i64; 3]) -> [i64; 3] {
    let size = meta.block_size(level);
    std::array::from_fn(|a| grid[a] + (-meta.global_origin[a] / size[a]).round() as i64)
}

/// Every degenerate ghost region of `block` holds [`field`] values of the
/// level it snapped to. Returns the number of voxels checked.
pub fn assert_snapped(meta: &GlobalMetadata, block: &Block) -> usize {
    let values = block
        .payload()
        .and_then(|p| p.as_slice::<f64>())
        .expect("local f64 block");
    let g = meta.ghosted_dimensions().map(|d| d as i64);
    let mut checked = 0;
    for region in Region::all() {
        let diff = block.region_level_difference(region) as usize;
        if diff == 0 {
            continue;
        }
        let low_level = block.level() - diff;
        let shift = lattice_shift(meta, low_level);
        let e = receiving_extent(meta.standard_block_dimensions, region);
        for z in e[4]..=e[5] {
            for y in e[2]..=e[3] {
                for x in e[0]..=e[1] {
                    let local = [x, y, z];
                    let low: [i64; 3] = std::array::from_fn(|a| {
                        coarsen(local[a] + block.origin_index()[a], diff) - shift[a]
                    });
                    let got = values[(x + g[0] * (y + g[1] * z)) as usize];
                    assert_eq!(
                        got,
                        field(low_level, low),
                        "block {:?} level {} region {:?} voxel {local:?}",
                        block.grid_index(),
                        block.level(),
                        region.offsets()
                    );
                    checked += 1;
                }
            }
        }
    }
    checked
}

/// Run `f` on `n` in-process ranks, one thread each, and collect the results
/// in rank order.
pub fn run_ranks<R: Send>(n: usize, f: impl Fn(LocalComm) -> R + Sync) -> Vec<R> {
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = LocalComm::world(n)
            .into_iter()
            .map(|comm| s.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank panicked"))
            .collect()
    })
}

/// The two-level layout used across tests: one coarse block with four fine
/// blocks covering its `+x` face.
pub fn coarse_with_fine_face() -> Vec<RawBlock> {
    let mut blocks = vec![field_block(0, [0, 0, 0])];
    for k in 0..2 {
        for j in 0..2 {
            blocks.push(field_block(1, [2, j, k]));
        }
    }
    blocks
}
