//! AmrError: Unified error type for amr-dualgrid public APIs
//!
//! Pass-level failures (missing metadata, an empty block set, a broken
//! collective exchange) are returned to the caller. Per-region failures are
//! logged and counted in [`ReconcileReport`](crate::report::ReconcileReport)
//! instead, so a single bad region never aborts a reconciliation pass.

use crate::data::scalar::ScalarType;
use thiserror::Error;

/// Unified error type for reconciliation operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmrError {
    /// Block registration attempted before the global metadata was resolved.
    #[error("global metadata (origin, root spacing, block dimensions) is not initialized")]
    MetadataNotInitialized,
    /// No process contributed any block; there is nothing to reconcile.
    #[error("no blocks exist on any process")]
    NoBlocks,
    /// A raw block carries an array other than the one being reconciled.
    #[error("block at level {level} is missing cell array `{name}`")]
    MissingArray { level: usize, name: String },
    /// Two blocks claim the same slot of a level grid.
    #[error("duplicate block at level {level}, grid index {grid_index:?}")]
    DuplicateBlock { level: usize, grid_index: [i64; 3] },
    /// A raw block extent is inverted or otherwise unusable.
    #[error("invalid block extent {0:?}")]
    InvalidExtent([i32; 6]),
    /// The voxel payload length disagrees with the block extent.
    #[error("payload has {found} values but the extent requires {expected}")]
    PayloadLengthMismatch { expected: usize, found: usize },
    /// A level difference does not fit the packed ownership encoding.
    #[error("level difference {level_difference} exceeds the encodable maximum of 127")]
    LevelDifferenceOverflow { level_difference: u32 },
    /// Source and receiving payloads of a degenerate copy differ in element type.
    #[error("element type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        expected: ScalarType,
        found: ScalarType,
    },
    /// A block that must hold voxel data is a skeleton on this process.
    #[error("block at level {level}, grid index {grid_index:?} has no payload")]
    MissingPayload { level: usize, grid_index: [i64; 3] },
    /// A degenerate region maps outside the source or receiving block.
    #[error("degenerate region {region:?} maps outside its blocks")]
    RegionOutOfBounds { region: [i8; 3] },
    /// Point-to-point communication with a peer failed.
    #[error("communication with rank {neighbor} failed: {message}")]
    CommError { neighbor: usize, message: String },
    /// A received message length differs from the length computed locally.
    #[error("rank {neighbor} sent {got} bytes, expected {expected}")]
    MessageLengthMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// A wire record could not be decoded.
    #[error("wire decode error: {0}")]
    WireDecode(String),
    /// An internal consistency check failed.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
