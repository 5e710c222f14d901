//! Global metadata shared by every rank: origin, root spacing, standard block
//! dimensions and the element type of the reconciled array.
//!
//! Each rank summarizes its raw blocks, rank 0 folds the summaries in rank
//! order, resolves the metadata and sends it back to every other rank. All
//! later geometry is derived from this one broadcast value, so it is
//! bit-identical everywhere.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{
    WireBlockSample, WireBlockSummary, WireMetadata, cast_slice, decode_records, f64_from_wire,
    f64_to_wire,
};
use crate::amr_error::AmrError;
use crate::data::raw_block::RawBlock;
use crate::data::scalar::ScalarType;
use serde::{Deserialize, Serialize};
use std::mem::size_of;

const SUMMARY_TAG: CommTag = CommTag::new(0x4d10);
const RESULT_TAG: CommTag = CommTag::new(0x4d11);

/// Shared lattice definition used to place every block.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetadata {
    pub global_origin: [f64; 3],
    /// Voxel spacing at level 0.
    pub root_spacing: [f64; 3],
    /// Interior cell counts of a block, ghost layer excluded.
    pub standard_block_dimensions: [i64; 3],
    pub scalar_type: ScalarType,
}

/// `2^level` as a float; exact for every level we can index.
pub(crate) fn level_scale(level: usize) -> f64 {
    2f64.powi(level as i32)
}

impl GlobalMetadata {
    pub fn spacing(&self, level: usize) -> [f64; 3] {
        let s = level_scale(level);
        self.root_spacing.map(|r| r / s)
    }

    /// Physical edge length of a block (interior only) at `level`.
    pub fn block_size(&self, level: usize) -> [f64; 3] {
        let s = level_scale(level);
        std::array::from_fn(|a| {
            self.root_spacing[a] * self.standard_block_dimensions[a] as f64 / s
        })
    }

    /// Cell counts of a block including its one-voxel ghost layer.
    pub fn ghosted_dimensions(&self) -> [usize; 3] {
        self.standard_block_dimensions.map(|d| (d + 2) as usize)
    }

    pub fn ghosted_len(&self) -> usize {
        self.ghosted_dimensions().iter().product()
    }

    /// Grid coordinates of the block whose physical center is `center`.
    pub fn grid_index(&self, level: usize, center: [f64; 3]) -> [i64; 3] {
        let size = self.block_size(level);
        std::array::from_fn(|a| ((center[a] - self.global_origin[a]) / size[a]).floor() as i64)
    }

    /// Level-lattice index of the voxel whose corner is at `position`.
    pub fn origin_index(&self, level: usize, position: [f64; 3]) -> [i64; 3] {
        let s = level_scale(level);
        std::array::from_fn(|a| {
            (0.5 + (position[a] - self.global_origin[a]) * s / self.root_spacing[a]).floor() as i64
        })
    }

    /// Origin index of a fully ghosted block at `grid`.
    pub fn skeleton_origin_index(&self, grid: [i64; 3]) -> [i64; 3] {
        std::array::from_fn(|a| self.standard_block_dimensions[a] * grid[a] - 1)
    }
}

/// One representative block seen by the reduction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlockSample {
    pub level: usize,
    pub cells: u64,
    pub scalar_type: ScalarType,
    /// Physical corner of the first voxel.
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    pub dims: [i64; 3],
}

impl BlockSample {
    fn of(block: &RawBlock) -> Self {
        let dims = block.cell_dimensions();
        Self {
            level: block.level,
            cells: block.number_of_cells() as u64,
            scalar_type: block.cells.scalar_type(),
            origin: block.first_voxel_origin(),
            spacing: block.spacing,
            dims: dims.map(|d| d as i64),
        }
    }

    fn to_wire(sample: Option<&Self>) -> WireBlockSample {
        match sample {
            None => bytemuck::Zeroable::zeroed(),
            Some(s) => WireBlockSample {
                present_le: 1u64.to_le(),
                level_le: (s.level as u64).to_le(),
                cells_le: s.cells.to_le(),
                scalar_le: s.scalar_type.code().to_le(),
                origin_le: s.origin.map(f64_to_wire),
                spacing_le: s.spacing.map(f64_to_wire),
                dims_le: s.dims.map(i64::to_le),
            },
        }
    }

    fn from_wire(w: &WireBlockSample) -> Result<Option<Self>, AmrError> {
        if u64::from_le(w.present_le) == 0 {
            return Ok(None);
        }
        let code = u64::from_le(w.scalar_le);
        let scalar_type = ScalarType::from_code(code)
            .ok_or_else(|| AmrError::WireDecode(format!("unknown scalar type code {code}")))?;
        Ok(Some(Self {
            level: u64::from_le(w.level_le) as usize,
            cells: u64::from_le(w.cells_le),
            scalar_type,
            origin: w.origin_le.map(f64_from_wire),
            spacing: w.spacing_le.map(f64_from_wire),
            dims: w.dims_le.map(i64::from_le),
        }))
    }
}

/// What one rank (or a fold of several) knows about its raw blocks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlockSummary {
    pub block_count: usize,
    /// Block with the coarsest spacing; first seen wins.
    pub coarsest: Option<BlockSample>,
    /// Block with the most cells; first seen wins.
    pub largest: Option<BlockSample>,
    /// Union of physical bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub bounds: [f64; 6],
}

impl Default for BlockSummary {
    fn default() -> Self {
        Self {
            block_count: 0,
            coarsest: None,
            largest: None,
            bounds: [
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ],
        }
    }
}

impl BlockSummary {
    pub fn from_blocks(blocks: &[RawBlock]) -> Self {
        let mut summary = Self::default();
        for block in blocks {
            summary.fold_sample(BlockSample::of(block), block.bounds(), 1);
        }
        summary
    }

    /// Fold another summary in. Folding is order dependent only through the
    /// "first seen wins" rule, so rank 0 always folds in rank order.
    pub fn merge(&mut self, other: &BlockSummary) {
        if let Some(largest) = other.largest {
            self.consider_largest(largest);
        }
        if let Some(coarsest) = other.coarsest {
            self.consider_coarsest(coarsest);
        }
        self.union_bounds(other.bounds);
        self.block_count += other.block_count;
    }

    fn fold_sample(&mut self, sample: BlockSample, bounds: [f64; 6], count: usize) {
        self.consider_largest(sample);
        self.consider_coarsest(sample);
        self.union_bounds(bounds);
        self.block_count += count;
    }

    fn consider_largest(&mut self, sample: BlockSample) {
        if self.largest.is_none_or(|l| sample.cells > l.cells) {
            self.largest = Some(sample);
        }
    }

    // Only the x spacing is compared; the other axes follow it.
    fn consider_coarsest(&mut self, sample: BlockSample) {
        if self.coarsest.is_none_or(|c| sample.spacing[0] > c.spacing[0]) {
            self.coarsest = Some(sample);
        }
    }

    fn union_bounds(&mut self, b: [f64; 6]) {
        for a in 0..3 {
            self.bounds[2 * a] = self.bounds[2 * a].min(b[2 * a]);
            self.bounds[2 * a + 1] = self.bounds[2 * a + 1].max(b[2 * a + 1]);
        }
    }

    /// Derive the global metadata from the folded summary.
    ///
    /// The largest block is assumed to carry both ghost layers; its interior
    /// lattice anchors the origin, which is then moved down by whole coarse
    /// blocks until every block has a non-negative grid index.
    pub fn resolve(&self) -> Result<GlobalMetadata, AmrError> {
        let (Some(largest), Some(coarsest)) = (self.largest, self.coarsest) else {
            return Err(AmrError::NoBlocks);
        };
        if self.block_count == 0 {
            return Err(AmrError::NoBlocks);
        }
        let dims = largest.dims.map(|d| (d - 2).max(1));
        let scale = level_scale(coarsest.level);
        let root_spacing = coarsest.spacing.map(|s| s * scale);

        let mut global_origin = [0.0; 3];
        for a in 0..3 {
            let trial = largest.origin[a] + largest.spacing[a];
            let lattice = largest.spacing[a] * dims[a] as f64;
            let snap = (0.5 + (coarsest.origin[a] - trial) / lattice).floor();
            let anchor = trial + snap * lattice;
            let coarse_lattice = coarsest.spacing[a] * dims[a] as f64;
            let shift = ((self.bounds[2 * a] - anchor) / coarse_lattice).floor();
            global_origin[a] = anchor + shift * coarse_lattice;
        }
        Ok(GlobalMetadata {
            global_origin,
            root_spacing,
            standard_block_dimensions: dims,
            scalar_type: largest.scalar_type,
        })
    }

    fn to_wire(&self) -> WireBlockSummary {
        WireBlockSummary {
            block_count_le: (self.block_count as u64).to_le(),
            coarsest: BlockSample::to_wire(self.coarsest.as_ref()),
            largest: BlockSample::to_wire(self.largest.as_ref()),
            bounds_le: self.bounds.map(f64_to_wire),
        }
    }

    fn from_wire(w: &WireBlockSummary) -> Result<Self, AmrError> {
        Ok(Self {
            block_count: u64::from_le(w.block_count_le) as usize,
            coarsest: BlockSample::from_wire(&w.coarsest)?,
            largest: BlockSample::from_wire(&w.largest)?,
            bounds: w.bounds_le.map(f64_from_wire),
        })
    }
}

fn metadata_to_wire(meta: Option<&GlobalMetadata>) -> WireMetadata {
    match meta {
        None => bytemuck::Zeroable::zeroed(),
        Some(m) => WireMetadata {
            valid_le: 1u64.to_le(),
            origin_le: m.global_origin.map(f64_to_wire),
            spacing_le: m.root_spacing.map(f64_to_wire),
            dims_le: m.standard_block_dimensions.map(i64::to_le),
            scalar_le: m.scalar_type.code().to_le(),
        },
    }
}

fn metadata_from_wire(w: &WireMetadata) -> Result<GlobalMetadata, AmrError> {
    if u64::from_le(w.valid_le) == 0 {
        return Err(AmrError::NoBlocks);
    }
    let code = u64::from_le(w.scalar_le);
    Ok(GlobalMetadata {
        global_origin: w.origin_le.map(f64_from_wire),
        root_spacing: w.spacing_le.map(f64_from_wire),
        standard_block_dimensions: w.dims_le.map(i64::from_le),
        scalar_type: ScalarType::from_code(code)
            .ok_or_else(|| AmrError::WireDecode(format!("unknown scalar type code {code}")))?,
    })
}

fn single<T: bytemuck::Pod>(bytes: &[u8]) -> Result<T, AmrError> {
    decode_records::<T>(bytes)?
        .into_iter()
        .next()
        .ok_or_else(|| AmrError::WireDecode("empty metadata message".into()))
}

/// Collective: every rank calls this with its local raw blocks and gets the
/// same metadata back, or [`AmrError::NoBlocks`] everywhere when no rank has
/// a block.
pub fn compute_global_metadata<C: Communicator>(
    blocks: &[RawBlock],
    comm: &C,
) -> Result<GlobalMetadata, AmrError> {
    let mut summary = BlockSummary::from_blocks(blocks);
    let (rank, size) = (comm.rank(), comm.size());
    log::debug!("[metadata] rank {rank}: {} local blocks", summary.block_count);
    if size <= 1 {
        return summary.resolve();
    }

    if rank != 0 {
        let wire = summary.to_wire();
        comm.send(0, SUMMARY_TAG, cast_slice(std::slice::from_ref(&wire)));
        let bytes = comm.recv_exact(0, RESULT_TAG, size_of::<WireMetadata>())?;
        return metadata_from_wire(&single::<WireMetadata>(&bytes)?);
    }

    for peer in 1..size {
        let bytes = comm.recv_exact(peer, SUMMARY_TAG, size_of::<WireBlockSummary>())?;
        let remote = BlockSummary::from_wire(&single::<WireBlockSummary>(&bytes)?)?;
        summary.merge(&remote);
    }
    let resolved = summary.resolve();
    let wire = metadata_to_wire(resolved.as_ref().ok());
    for peer in 1..size {
        comm.send(peer, RESULT_TAG, cast_slice(std::slice::from_ref(&wire)));
    }
    if let Ok(meta) = &resolved {
        log::info!(
            "[metadata] origin {:?}, root spacing {:?}, block dims {:?}, {} blocks total",
            meta.global_origin,
            meta.root_spacing,
            meta.standard_block_dimensions,
            summary.block_count
        );
    }
    resolved
}
