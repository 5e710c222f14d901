//! Raw input blocks as produced by a mesh reader.
//!
//! A [`RawBlock`] is one uniform sub-grid at one refinement level: a point
//! extent, origin and spacing in physical space, plus a single named cell
//! array. Readers may strip the ghost layer from blocks on the domain
//! boundary; [`restore_ghost_layers`] pads such blocks back to the standard
//! ghosted shape.

use crate::amr_error::AmrError;
use crate::data::scalar::{Scalar, ScalarArray};
use crate::dispatch_scalar;

/// One uniform block handed over by the reader.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBlock {
    pub level: usize,
    /// Physical position of point index `(0, 0, 0)`.
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
    /// Inclusive point extent `[x0, x1, y0, y1, z0, z1]`.
    pub extent: [i32; 6],
    pub array_name: String,
    pub cells: ScalarArray,
}

impl RawBlock {
    /// Build a block, checking the extent against the cell array length.
    pub fn new(
        level: usize,
        origin: [f64; 3],
        spacing: [f64; 3],
        extent: [i32; 6],
        array_name: impl Into<String>,
        cells: ScalarArray,
    ) -> Result<Self, AmrError> {
        if (0..3).any(|a| extent[2 * a + 1] < extent[2 * a]) {
            return Err(AmrError::InvalidExtent(extent));
        }
        let block = Self {
            level,
            origin,
            spacing,
            extent,
            array_name: array_name.into(),
            cells,
        };
        let expected = block.number_of_cells();
        if block.cells.len() != expected {
            return Err(AmrError::PayloadLengthMismatch {
                expected,
                found: block.cells.len(),
            });
        }
        Ok(block)
    }

    /// Cell counts per axis. A flat axis still holds one layer of cells.
    pub fn cell_dimensions(&self) -> [usize; 3] {
        std::array::from_fn(|a| ((self.extent[2 * a + 1] - self.extent[2 * a]) as usize).max(1))
    }

    pub fn number_of_cells(&self) -> usize {
        self.cell_dimensions().iter().product()
    }

    /// Physical point bounds `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn bounds(&self) -> [f64; 6] {
        std::array::from_fn(|i| {
            let a = i / 2;
            self.origin[a] + self.spacing[a] * f64::from(self.extent[i])
        })
    }

    /// Physical corner of the first voxel.
    pub fn first_voxel_origin(&self) -> [f64; 3] {
        std::array::from_fn(|a| self.origin[a] + self.spacing[a] * f64::from(self.extent[2 * a]))
    }

    pub fn center(&self) -> [f64; 3] {
        let b = self.bounds();
        std::array::from_fn(|a| (b[2 * a] + b[2 * a + 1]) * 0.5)
    }
}

/// Pad a block whose boundary ghost layer was stripped.
///
/// `origin_index` is the level-lattice index of the first voxel and is moved
/// back by one on every axis whose negative ghost layer is added. Returns the
/// padded array and its dimensions, or `None` when the block already carries
/// its ghost layers.
pub fn restore_ghost_layers(
    cells: &ScalarArray,
    dims: [usize; 3],
    origin_index: &mut [i64; 3],
    standard_dims: [i64; 3],
) -> Option<(ScalarArray, [usize; 3])> {
    let mut out_dims = dims;
    let mut offset = [0usize; 3];
    let mut pad = false;
    for a in 0..3 {
        // A ghosted block starts one voxel before the block lattice and ends
        // one voxel past it, so alignment on either side means a stripped layer.
        if origin_index[a].rem_euclid(standard_dims[a]) == 0 {
            origin_index[a] -= 1;
            offset[a] = 1;
            out_dims[a] += 1;
            pad = true;
        }
        if (origin_index[a] + offset[a] as i64 + dims[a] as i64).rem_euclid(standard_dims[a]) == 0 {
            out_dims[a] += 1;
            pad = true;
        }
    }
    if !pad {
        return None;
    }
    let padded = dispatch_scalar!(cells.scalar_type(), T => {
        let values = cells.as_slice::<T>()?;
        T::wrap(replicate_edges(values, dims, out_dims, offset))
    });
    Some((padded, out_dims))
}

/// Copy `input` into a larger array, repeating the nearest edge value into
/// the new layers.
fn replicate_edges<T: Scalar>(
    input: &[T],
    in_dims: [usize; 3],
    out_dims: [usize; 3],
    offset: [usize; 3],
) -> Vec<T> {
    let clamp = |v: usize, a: usize| v.saturating_sub(offset[a]).min(in_dims[a] - 1);
    let mut out = Vec::with_capacity(out_dims.iter().product());
    for z in 0..out_dims[2] {
        let iz = clamp(z, 2);
        for y in 0..out_dims[1] {
            let iy = clamp(y, 1);
            for x in 0..out_dims[0] {
                let ix = clamp(x, 0);
                out.push(input[ix + in_dims[0] * (iy + in_dims[1] * iz)]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_payload() {
        let err = RawBlock::new(
            0,
            [0.0; 3],
            [1.0; 3],
            [0, 2, 0, 2, 0, 2],
            "vf",
            ScalarArray::from(vec![0u8; 7]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AmrError::PayloadLengthMismatch {
                expected: 8,
                found: 7
            }
        );
    }

    #[test]
    fn bounds_follow_extent() {
        let b = RawBlock::new(
            1,
            [1.0, 0.0, 0.0],
            [0.5; 3],
            [2, 4, 0, 2, 0, 1],
            "vf",
            ScalarArray::from(vec![0.0f32; 4]),
        )
        .unwrap();
        assert_eq!(b.bounds(), [2.0, 3.0, 0.0, 1.0, 0.0, 0.5]);
        assert_eq!(b.first_voxel_origin(), [2.0, 0.0, 0.0]);
        assert_eq!(b.cell_dimensions(), [2, 2, 1]);
    }

    #[test]
    fn ghosted_block_is_left_alone() {
        // dims 4 ghosted to 6, first voxel at lattice index -1
        let cells = ScalarArray::from(vec![0u8; 216]);
        let mut origin = [-1, 3, 7];
        assert!(restore_ghost_layers(&cells, [6, 6, 6], &mut origin, [4, 4, 4]).is_none());
        assert_eq!(origin, [-1, 3, 7]);
    }

    #[test]
    fn stripped_negative_side_is_replicated() {
        // x lost its low ghost layer: 5 cells starting on the lattice.
        let values: Vec<i32> = (0..5 * 6 * 6).collect();
        let cells = ScalarArray::from(values.clone());
        let mut origin = [0, -1, -1];
        let (padded, dims) =
            restore_ghost_layers(&cells, [5, 6, 6], &mut origin, [4, 4, 4]).unwrap();
        assert_eq!(dims, [6, 6, 6]);
        assert_eq!(origin, [-1, -1, -1]);
        let p = padded.as_slice::<i32>().unwrap();
        // new layer copies the first original column
        assert_eq!(p[0], values[0]);
        assert_eq!(p[1], values[0]);
        assert_eq!(p[5], values[4]);
        assert_eq!(p[6], values[5]);
    }
}
