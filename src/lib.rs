#![cfg_attr(docsrs, feature(doc_cfg))]
//! # amr-dualgrid
//!
//! amr-dualgrid reconciles a distributed set of axis-aligned AMR blocks so a
//! dual-grid (cell-centered) contouring pass can treat block boundaries
//! consistently. It resolves the global block lattice, shares a skeleton of
//! every block with every process, decides which block owns each shared
//! region, and moves coarse voxel values into the ghost layers of finer
//! blocks that snap to them.
//!
//! ## Features
//! - Global metadata (origin, root spacing, block dimensions) agreed by one collective
//! - Skeleton exchange so every rank sees the full block layout
//! - Deterministic shared-region ownership, identical on every rank
//! - Degenerate-region ghost copies, local or batched per peer rank
//! - Optional shared block faces for seeding connected-component labeling
//! - Pluggable communication backends (serial, in-process threads, MPI)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! amr-dualgrid = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! A pass is driven by [`reconcile::DualGridHelper`]. Every phase is
//! collective: all ranks must call it with the same configuration.

pub mod algs;
pub mod amr_error;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod reconcile;
pub mod report;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::degenerate::{DegenerateQueue, DegenerateRegionCopy};
    pub use crate::algs::metadata::GlobalMetadata;
    pub use crate::amr_error::AmrError;
    pub use crate::config::{ReconcileConfig, TieBreak};
    pub use crate::data::raw_block::RawBlock;
    pub use crate::data::scalar::{Scalar, ScalarArray, ScalarType};
    pub use crate::reconcile::DualGridHelper;
    pub use crate::report::ReconcileReport;
    pub use crate::topology::{Block, BlockId, BlockRegistry, Face, Region, RegionOwnership};
}
