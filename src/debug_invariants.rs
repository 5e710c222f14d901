use crate::amr_error::AmrError;
use crate::topology::registry::BlockRegistry;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), AmrError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

impl DebugInvariants for BlockRegistry {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "block registry");
    }

    /// Every listed block sits in its level grid at its own grid index, and
    /// every occupied grid slot points at a block of that level.
    fn validate_invariants(&self) -> Result<(), AmrError> {
        let violation = |msg: String| Err(AmrError::InvariantViolation(msg));
        let mut listed = 0;
        for (l, level) in self.levels().iter().enumerate() {
            if level.level() != l {
                return violation(format!("level {l} is labelled {}", level.level()));
            }
            for &id in level.blocks() {
                let b = self.block(id);
                if b.level() != l {
                    return violation(format!("block {id:?} of level {} listed in level {l}", b.level()));
                }
                if level.get(b.grid_index()) != Some(id) {
                    return violation(format!(
                        "block {id:?} missing from level {l} grid at {:?}",
                        b.grid_index()
                    ));
                }
            }
            for (grid, id) in level.iter_grid() {
                if self.block(id).grid_index() != grid {
                    return violation(format!("grid slot {grid:?} of level {l} holds block {id:?}"));
                }
            }
            listed += level.len();
        }
        if listed != self.number_of_blocks() {
            return violation(format!(
                "{listed} blocks listed in levels, {} registered",
                self.number_of_blocks()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::metadata::GlobalMetadata;
    use crate::data::scalar::ScalarType;

    #[test]
    fn populated_registry_is_consistent() {
        let mut reg = BlockRegistry::with_metadata(
            0,
            GlobalMetadata {
                global_origin: [0.0; 3],
                root_spacing: [1.0; 3],
                standard_block_dimensions: [2, 2, 2],
                scalar_type: ScalarType::U8,
            },
        );
        for (level, grid) in [(0, [0, 0, 0]), (0, [3, -1, 2]), (2, [1, 1, 1])] {
            reg.add_grid_block(level, grid, 0, None).unwrap();
        }
        assert_eq!(reg.validate_invariants(), Ok(()));
        reg.debug_assert_invariants();
    }
}
