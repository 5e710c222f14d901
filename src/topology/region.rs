//! Relative directions around a block: the 26 shared regions and 6 faces.

use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// One cell of the 3x3x3 neighbor lattice around a block, each offset in `-1..=1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region([i8; 3]);

impl Region {
    /// Number of cells in the neighbor lattice, center included.
    pub const COUNT: usize = 27;

    pub const CENTER: Self = Self([0; 3]);

    pub const fn new(x: i8, y: i8, z: i8) -> Self {
        debug_assert!(x >= -1 && x <= 1 && y >= -1 && y <= 1 && z >= -1 && z <= 1);
        Self([x, y, z])
    }

    pub fn from_offsets(offsets: [i8; 3]) -> Self {
        Self::new(offsets[0], offsets[1], offsets[2])
    }

    pub fn offsets(self) -> [i8; 3] {
        self.0
    }

    pub fn offset(self, axis: usize) -> i8 {
        self.0[axis]
    }

    pub fn is_center(self) -> bool {
        self == Self::CENTER
    }

    /// Number of non-zero axes: 1 for a face, 2 for an edge, 3 for a corner.
    pub fn adjacency(self) -> u32 {
        self.0.iter().filter(|&&o| o != 0).count() as u32
    }

    /// Squared distance of the block center from the region, in `0..=3`.
    pub fn distance(self) -> i32 {
        self.0.iter().map(|&o| i32::from(o) * i32::from(o)).sum()
    }

    pub fn reversed(self) -> Self {
        Self(self.0.map(|o| -o))
    }

    /// Position in a `[[[_; 3]; 3]; 3]`-style linear table, x fastest.
    pub fn linear(self) -> usize {
        let [x, y, z] = self.0.map(|o| (o + 1) as usize);
        x + 3 * y + 9 * z
    }

    /// All 26 non-center regions, z outermost and x innermost.
    pub fn all() -> impl Iterator<Item = Region> {
        iproduct!(-1i8..=1, -1i8..=1, -1i8..=1)
            .map(|(z, y, x)| Region::new(x, y, z))
            .filter(|r| !r.is_center())
    }

    /// The face this region crosses, if it is a face region.
    pub fn face(self) -> Option<Face> {
        if self.adjacency() != 1 {
            return None;
        }
        let axis = self.0.iter().position(|&o| o != 0)?;
        Some(Face {
            axis,
            positive: self.0[axis] > 0,
        })
    }
}

/// A face of a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Face {
    pub axis: usize,
    pub positive: bool,
}

impl Face {
    pub fn negative(axis: usize) -> Self {
        assert!(axis < 3);
        Self {
            axis,
            positive: false,
        }
    }

    pub fn positive(axis: usize) -> Self {
        assert!(axis < 3);
        Self {
            axis,
            positive: true,
        }
    }

    pub fn reversed(self) -> Self {
        Self {
            axis: self.axis,
            positive: !self.positive,
        }
    }

    /// `-x, +x, -y, +y, -z, +z` map to `0..6`.
    pub fn to_linear(self) -> usize {
        2 * self.axis + self.positive as usize
    }

    pub fn from_linear(linear: usize) -> Self {
        assert!(linear < 6);
        Self {
            axis: linear / 2,
            positive: linear % 2 == 1,
        }
    }

    pub fn all() -> impl Iterator<Item = Face> {
        (0..6).map(Face::from_linear)
    }

    /// Unit step across the face.
    pub fn step(self) -> [i64; 3] {
        let mut s = [0; 3];
        s[self.axis] = if self.positive { 1 } else { -1 };
        s
    }

    pub fn region(self) -> Region {
        let s = self.step();
        Region::new(s[0] as i8, s[1] as i8, s[2] as i8)
    }
}
