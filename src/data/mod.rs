//! Data module: typed voxel payloads and raw input blocks

pub mod raw_block;
pub mod scalar;

pub use raw_block::RawBlock;
pub use scalar::{Scalar, ScalarArray, ScalarType};
