//! Re-export public algorithms.

pub mod communicator;
pub mod degenerate;
pub mod distribute;
pub mod faces;
pub mod lattice;
pub mod metadata;
pub mod shared_regions;
pub mod wire;

pub use degenerate::{DegenerateQueue, DegenerateRegionCopy, process_degenerate_queue};
pub use distribute::share_blocks;
pub use faces::create_faces;
pub use metadata::{GlobalMetadata, compute_global_metadata};
pub use shared_regions::assign_shared_regions;
