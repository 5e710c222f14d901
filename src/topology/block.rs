//! Blocks, their per-region ownership state and boundary mask.

use crate::amr_error::AmrError;
use crate::data::scalar::ScalarArray;
use crate::topology::face::SharedFace;
use crate::topology::region::{Face, Region};
use serde::{Deserialize, Serialize};

/// Stable handle of a block inside a [`BlockRegistry`](crate::topology::registry::BlockRegistry).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which block generates a shared region, from one block's point of view.
///
/// The packed form used by surface extractors is one byte: bit 7 is the
/// owner flag and bits 0..7 hold the level difference of a degenerate
/// region, so differences above [`RegionOwnership::MAX_LEVEL_DIFFERENCE`]
/// cannot be represented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionOwnership {
    /// This block generates the region at its own resolution.
    #[default]
    Owned,
    /// This block generates the region, snapped to a level this many levels coarser.
    Degenerate { level_difference: u8 },
    /// A neighbor generates the region.
    Ceded,
}

impl RegionOwnership {
    pub const OWNER_BIT: u8 = 0x80;
    pub const LEVEL_MASK: u8 = 0x7f;
    pub const MAX_LEVEL_DIFFERENCE: u32 = Self::LEVEL_MASK as u32;

    /// Encode a degenerate region, failing when the difference does not fit.
    pub fn degenerate(level_difference: u32) -> Result<Self, AmrError> {
        if level_difference == 0 {
            return Ok(Self::Owned);
        }
        if level_difference > Self::MAX_LEVEL_DIFFERENCE {
            return Err(AmrError::LevelDifferenceOverflow { level_difference });
        }
        Ok(Self::Degenerate {
            level_difference: level_difference as u8,
        })
    }

    pub fn is_owner(self) -> bool {
        !matches!(self, Self::Ceded)
    }

    pub fn level_difference(self) -> u32 {
        match self {
            Self::Degenerate { level_difference } => u32::from(level_difference),
            _ => 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            Self::Owned => Self::OWNER_BIT,
            Self::Degenerate { level_difference } => Self::OWNER_BIT | level_difference,
            Self::Ceded => 0,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        if bits & Self::OWNER_BIT == 0 {
            Self::Ceded
        } else {
            match bits & Self::LEVEL_MASK {
                0 => Self::Owned,
                level_difference => Self::Degenerate { level_difference },
            }
        }
    }
}

/// One bit per face; a set bit marks a domain boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryMask(u8);

impl BoundaryMask {
    pub const ALL: Self = Self(63);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_boundary(self, face: Face) -> bool {
        self.0 & (1 << face.to_linear()) != 0
    }

    pub fn clear(&mut self, face: Face) {
        self.0 &= !(1 << face.to_linear());
    }
}

impl Default for BoundaryMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// One rectangular ghosted sub-grid at one refinement level.
#[derive(Clone, Debug)]
pub struct Block {
    pub(crate) level: usize,
    pub(crate) grid_index: [i64; 3],
    pub(crate) origin_index: [i64; 3],
    pub(crate) owner: usize,
    pub(crate) payload: Option<ScalarArray>,
    pub(crate) regions: [RegionOwnership; Region::COUNT],
    pub(crate) boundary: BoundaryMask,
    pub(crate) faces: [Option<SharedFace>; 6],
}

impl Block {
    pub(crate) fn new(
        level: usize,
        grid_index: [i64; 3],
        origin_index: [i64; 3],
        owner: usize,
        payload: Option<ScalarArray>,
    ) -> Self {
        Self {
            level,
            grid_index,
            origin_index,
            owner,
            payload,
            regions: [RegionOwnership::Owned; Region::COUNT],
            boundary: BoundaryMask::ALL,
            faces: Default::default(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn grid_index(&self) -> [i64; 3] {
        self.grid_index
    }

    /// Level-lattice index of the first (ghost) voxel.
    pub fn origin_index(&self) -> [i64; 3] {
        self.origin_index
    }

    /// Rank holding the authoritative payload.
    pub fn owner(&self) -> usize {
        self.owner
    }

    pub fn payload(&self) -> Option<&ScalarArray> {
        self.payload.as_ref()
    }

    /// `false` for skeleton blocks.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn region(&self, region: Region) -> RegionOwnership {
        self.regions[region.linear()]
    }

    pub fn owns_region(&self, region: Region) -> bool {
        self.region(region).is_owner()
    }

    pub fn region_level_difference(&self, region: Region) -> u32 {
        self.region(region).level_difference()
    }

    /// Ownership bytes indexed `[x + 1][y + 1][z + 1]`.
    pub fn region_bits(&self) -> [[[u8; 3]; 3]; 3] {
        let mut bits = [[[0u8; 3]; 3]; 3];
        for (x, plane) in bits.iter_mut().enumerate() {
            for (y, row) in plane.iter_mut().enumerate() {
                for (z, b) in row.iter_mut().enumerate() {
                    let r = Region::new(x as i8 - 1, y as i8 - 1, z as i8 - 1);
                    *b = self.region(r).to_bits();
                }
            }
        }
        bits
    }

    pub fn boundary_mask(&self) -> BoundaryMask {
        self.boundary
    }

    pub fn is_boundary_face(&self, face: Face) -> bool {
        self.boundary.is_boundary(face)
    }

    pub fn face(&self, face: Face) -> Option<&SharedFace> {
        self.faces[face.to_linear()].as_ref()
    }

    pub(crate) fn set_region(&mut self, region: Region, state: RegionOwnership) {
        self.regions[region.linear()] = state;
    }

    pub(crate) fn set_face(&mut self, face: Face, shared: SharedFace) {
        self.faces[face.to_linear()] = Some(shared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_bits_round_trip() {
        for state in [
            RegionOwnership::Owned,
            RegionOwnership::Ceded,
            RegionOwnership::Degenerate {
                level_difference: 1,
            },
            RegionOwnership::Degenerate {
                level_difference: 127,
            },
        ] {
            assert_eq!(RegionOwnership::from_bits(state.to_bits()), state);
        }
        assert_eq!(RegionOwnership::Owned.to_bits(), 0x80);
    }

    #[test]
    fn level_difference_overflow_is_an_error() {
        assert_eq!(
            RegionOwnership::degenerate(127).unwrap().level_difference(),
            127
        );
        assert_eq!(
            RegionOwnership::degenerate(128),
            Err(AmrError::LevelDifferenceOverflow {
                level_difference: 128
            })
        );
        assert_eq!(RegionOwnership::degenerate(0), Ok(RegionOwnership::Owned));
    }

    #[test]
    fn new_block_owns_everything_and_is_all_boundary() {
        let b = Block::new(0, [0; 3], [-1; 3], 0, None);
        assert!(Region::all().all(|r| b.owns_region(r)));
        assert_eq!(b.boundary_mask().bits(), 63);
        assert!(!b.has_payload());
    }

    #[test]
    fn clearing_faces_matches_bit_layout() {
        let mut m = BoundaryMask::ALL;
        m.clear(Face::negative(0));
        assert_eq!(m.bits(), 62);
        m.clear(Face::positive(2));
        assert_eq!(m.bits(), 30);
        assert!(!m.is_boundary(Face::positive(2)));
        assert!(m.is_boundary(Face::negative(1)));
    }
}
