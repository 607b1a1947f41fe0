#![forbid(unsafe_code)]

//! Errors and non-error outcomes of ordering operations.
//!
//! Normal edge cases (empty lists, unknown ids, drops onto self) never produce
//! an [`EngineError`]; they surface as [`MoveOutcome::Unchanged`] or
//! [`ReorderResult::Rejected`]. Errors are reserved for caller input that
//! cannot be interpreted at all.

use std::fmt;

/// Errors returned by the engine's validating entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A user-entered position was not a number.
    InvalidPosition(String),
    /// No category level with this index exists.
    UnknownLevel(usize),
    /// The level is calculated and cannot be used for grouping or reordering.
    CalculatedLevel(usize),
    /// The label is not part of the level's label list.
    UnknownLabel(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPosition(input) => write!(f, "invalid position: {input:?} is not a number"),
            Self::UnknownLevel(level) => write!(f, "unknown category level {level}"),
            Self::CalculatedLevel(level) => {
                write!(f, "category level {level} is calculated and read-only")
            }
            Self::UnknownLabel(label) => write!(f, "unknown category label {label:?}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Result of a store-level move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The sequence changed.
    Moved,
    /// The move produced an identical sequence, or there was nothing to move.
    Unchanged,
}

impl MoveOutcome {
    /// Returns true if the sequence changed.
    #[must_use]
    pub fn is_moved(self) -> bool {
        matches!(self, Self::Moved)
    }
}

/// Why a reorder was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Grouped view is active and the flat order is not aligned with it.
    Misaligned,
    /// The dragged items belong to more than one group.
    SpansGroups,
    /// The target position would leave the group where it is.
    NoOpPosition,
    /// The group cannot be moved (uncategorized sentinel or not displayed).
    ImmovableGroup(String),
    /// No grouping level is active.
    NotGrouped,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned => write!(f, "item order is not aligned with the active grouping"),
            Self::SpansGroups => write!(f, "dragged items span more than one group"),
            Self::NoOpPosition => write!(f, "target position leaves the order unchanged"),
            Self::ImmovableGroup(label) => write!(f, "group {label:?} cannot be moved"),
            Self::NotGrouped => write!(f, "no grouping level is active"),
        }
    }
}

/// Outcome of a reorder that may be refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderResult {
    /// The reorder was committed.
    Applied,
    /// The reorder was valid but changed nothing.
    Unchanged,
    /// The reorder was refused and nothing was mutated.
    Rejected {
        /// Why the reorder was refused.
        reason: RejectReason,
    },
}

impl ReorderResult {
    /// Create a rejection with the given reason.
    #[must_use]
    pub fn rejected(reason: RejectReason) -> Self {
        Self::Rejected { reason }
    }

    /// Returns true if the reorder was committed.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl From<MoveOutcome> for ReorderResult {
    fn from(outcome: MoveOutcome) -> Self {
        match outcome {
            MoveOutcome::Moved => Self::Applied,
            MoveOutcome::Unchanged => Self::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            EngineError::InvalidPosition("abc".into()).to_string(),
            "invalid position: \"abc\" is not a number"
        );
        assert_eq!(
            EngineError::CalculatedLevel(2).to_string(),
            "category level 2 is calculated and read-only"
        );
    }

    #[test]
    fn reorder_result_from_outcome() {
        assert!(ReorderResult::from(MoveOutcome::Moved).is_applied());
        assert_eq!(
            ReorderResult::from(MoveOutcome::Unchanged),
            ReorderResult::Unchanged
        );
        assert!(!ReorderResult::rejected(RejectReason::Misaligned).is_applied());
    }
}
