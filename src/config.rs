//! Options of one reconciliation pass.

use serde::{Deserialize, Serialize};

/// How two non-self candidates at the same distance from a region are ordered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The coarser candidate wins, so a region always snaps to the lowest
    /// level that touches it at that distance.
    #[default]
    LowestLevel,
    /// The first candidate found wins (finest level first, then `z, y, x`
    /// neighbor order).
    TraversalOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Cell array to reconcile. Blocks carrying another array are skipped;
    /// an empty name accepts every block.
    pub array_name: String,
    /// Snap the ghost layer of finer blocks to coarser owners.
    pub enable_degenerate_cells: bool,
    /// Resolve ownership but never copy ghost values.
    pub skip_ghost_copy: bool,
    pub tie_break: TieBreak,
    /// Precede every degenerate-region message with its length and check it
    /// on receipt. Off by default: both ends already derive the length.
    pub verify_message_lengths: bool,
    /// Build shared block faces after ownership resolution.
    pub create_faces: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            array_name: String::new(),
            enable_degenerate_cells: true,
            skip_ghost_copy: false,
            tie_break: TieBreak::default(),
            verify_message_lengths: false,
            create_faces: false,
        }
    }
}

impl ReconcileConfig {
    pub fn for_array(name: impl Into<String>) -> Self {
        Self {
            array_name: name.into(),
            ..Self::default()
        }
    }

    /// Whether a block carrying `name` takes part in the pass.
    pub fn accepts(&self, name: &str) -> bool {
        self.array_name.is_empty() || self.array_name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_degenerate_cells() {
        let c = ReconcileConfig::default();
        assert!(c.enable_degenerate_cells);
        assert!(!c.skip_ghost_copy);
        assert_eq!(c.tie_break, TieBreak::LowestLevel);
        assert!(c.accepts("anything"));
        assert!(!ReconcileConfig::for_array("vf").accepts("rho"));
    }
}
