//! Fixed, little-endian wire types for the collective phases.
//!
//! Every record is `Pod` with explicit, padding-free layout. Floating-point
//! values travel as their IEEE-754 bit patterns so that every rank decodes
//! bit-identical numbers.

use crate::amr_error::AmrError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a byte buffer into records, tolerating unaligned input.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Result<Vec<T>, AmrError> {
    if bytes.len() % size_of::<T>() != 0 {
        return Err(AmrError::WireDecode(format!(
            "{} bytes is not a whole number of {}-byte records",
            bytes.len(),
            size_of::<T>()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

pub fn expect_exact_len(neighbor: usize, actual: usize, expected: usize) -> Result<(), AmrError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AmrError::MessageLengthMismatch {
            neighbor,
            expected,
            got: actual,
        })
    }
}

#[inline]
pub fn f64_to_wire(v: f64) -> u64 {
    v.to_bits().to_le()
}

#[inline]
pub fn f64_from_wire(w: u64) -> f64 {
    f64::from_bits(u64::from_le(w))
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32, // count of following records
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

// ===== Block distribution ==================================================

/// A skeleton block: level, owning rank and grid coordinates.
/// NOTE: ranks are u32 (never usize) on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireBlockRecord {
    pub level_le: u32,
    pub owner_le: u32,
    pub grid_le: [i64; 3],
}

impl WireBlockRecord {
    pub const SIZE: usize = 32;

    pub fn new(level: usize, owner: usize, grid: [i64; 3]) -> Self {
        Self {
            level_le: (level as u32).to_le(),
            owner_le: (owner as u32).to_le(),
            grid_le: grid.map(i64::to_le),
        }
    }
    pub fn level(&self) -> usize {
        u32::from_le(self.level_le) as usize
    }
    pub fn owner(&self) -> usize {
        u32::from_le(self.owner_le) as usize
    }
    pub fn grid(&self) -> [i64; 3] {
        self.grid_le.map(i64::from_le)
    }
}

// ===== Metadata reduction ==================================================

/// A representative block sampled by the metadata reduction.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireBlockSample {
    pub present_le: u64, // 0 = no sample
    pub level_le: u64,
    pub cells_le: u64,
    pub scalar_le: u64,
    pub origin_le: [u64; 3],
    pub spacing_le: [u64; 3],
    pub dims_le: [i64; 3],
}

/// One rank's contribution to the metadata reduction.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireBlockSummary {
    pub block_count_le: u64,
    pub coarsest: WireBlockSample,
    pub largest: WireBlockSample,
    pub bounds_le: [u64; 6],
}

/// The resolved metadata broadcast by rank 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireMetadata {
    pub valid_le: u64, // 0 = no blocks anywhere
    pub origin_le: [u64; 3],
    pub spacing_le: [u64; 3],
    pub dims_le: [i64; 3],
    pub scalar_le: u64,
}

// ===== Compile-time sanity checks =========================================

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireBlockRecord>(), WireBlockRecord::SIZE);
const_assert_eq!(align_of::<WireBlockRecord>(), 8);
const_assert_eq!(size_of::<WireBlockSample>(), 13 * 8);
const_assert_eq!(size_of::<WireBlockSummary>(), 33 * 8);
const_assert_eq!(size_of::<WireMetadata>(), 11 * 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_block_record() {
        let v = vec![
            WireBlockRecord::new(3, 2, [-4, 0, 17]),
            WireBlockRecord::new(0, 0, [1, 2, 3]),
        ];
        let bytes = cast_slice(&v).to_vec();
        let out: Vec<WireBlockRecord> = decode_records(&bytes).unwrap();
        assert_eq!(out[0].level(), 3);
        assert_eq!(out[0].owner(), 2);
        assert_eq!(out[0].grid(), [-4, 0, 17]);
        assert_eq!(out[1].grid(), [1, 2, 3]);
    }

    #[test]
    fn unaligned_buffers_decode() {
        let rec = WireBlockRecord::new(1, 1, [9, 8, 7]);
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(cast_slice(std::slice::from_ref(&rec)));
        let out: Vec<WireBlockRecord> = decode_records(&bytes[1..]).unwrap();
        assert_eq!(out[0].grid(), [9, 8, 7]);
    }

    #[test]
    fn partial_record_is_an_error() {
        assert!(matches!(
            decode_records::<WireBlockRecord>(&[0u8; 33]),
            Err(AmrError::WireDecode(_))
        ));
    }

    #[test]
    fn floats_keep_their_bits() {
        for v in [0.1, -3.75, f64::MIN_POSITIVE, 1e300] {
            assert_eq!(f64_from_wire(f64_to_wire(v)).to_bits(), v.to_bits());
        }
    }
}
