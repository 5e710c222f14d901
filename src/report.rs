//! Diagnostics of one reconciliation pass.
//!
//! Per-region failures never abort a pass; they leave a seam in the output
//! and are counted here instead.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Degenerate regions whose level difference could not be encoded.
    pub encoding_overflows: usize,
    /// Copies skipped because source and receiving arrays differ in type.
    pub type_mismatches: usize,
    /// Copies skipped for any other per-region reason.
    pub skipped_copies: usize,
    /// Local raw blocks left out of the pass.
    pub skipped_blocks: usize,
    /// Degenerate regions copied directly between two local blocks.
    pub local_copies: usize,
    /// Degenerate regions deferred to the cross-rank exchange.
    pub queued_copies: usize,
    pub remote_regions_sent: usize,
    pub remote_regions_received: usize,
    pub bytes_sent: usize,
    pub bytes_received: usize,
    pub faces_created: usize,
}

impl ReconcileReport {
    /// `true` when some region may show a seam.
    pub fn is_degraded(&self) -> bool {
        self.encoding_overflows + self.type_mismatches + self.skipped_copies > 0
    }
}
