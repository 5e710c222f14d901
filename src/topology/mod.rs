//! Block topology: per-level grids of blocks and their region ownership.
//!
//! - [`region`]: the 27 neighborhood regions of a block and its six faces
//! - [`block`]: one AMR block with packed region ownership and boundary bits
//! - [`level`]: a growable dense grid of block handles for one refinement level
//! - [`registry`]: the process-local registry of every known block
//! - [`face`]: shared block faces carrying fragment seeds

pub mod block;
pub mod face;
pub mod level;
pub mod region;
pub mod registry;

pub use block::{Block, BlockId, BoundaryMask, RegionOwnership};
pub use face::{BlockFace, FragmentSeed, SharedFace};
pub use level::Level;
pub use region::{Face, Region};
pub use registry::BlockRegistry;
