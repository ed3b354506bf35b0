//! Error types for the CFLP solver.

use crate::score::HardSoftScore;
use std::fmt;

/// Kind of entity a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Facility,
    Consumer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Facility => write!(f, "facility"),
            EntityKind::Consumer => write!(f, "consumer"),
        }
    }
}

/// Errors raised while building, solving or reporting a facility location problem.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The problem instance is malformed. Raised before any search starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A move or assignment named an entity that does not exist, or whose
    /// state no longer matches what the move expected.
    #[error("invalid reference to {kind}: {detail}")]
    InvalidReference { kind: EntityKind, detail: String },

    /// The incrementally tracked score disagrees with a full recomputation.
    #[error("score drift detected at iteration {iteration}: tracked {tracked}, recomputed {recomputed}")]
    ScoreDriftDetected {
        iteration: u64,
        tracked: HardSoftScore,
        recomputed: HardSoftScore,
    },

    /// The solver configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl SolverError {
    pub(crate) fn unknown_facility_index(index: usize) -> Self {
        SolverError::InvalidReference {
            kind: EntityKind::Facility,
            detail: format!("no facility at index {}", index),
        }
    }

    pub(crate) fn unknown_consumer_index(index: usize) -> Self {
        SolverError::InvalidReference {
            kind: EntityKind::Consumer,
            detail: format!("no consumer at index {}", index),
        }
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SolverError::unknown_facility_index(7);
        assert_eq!(err.to_string(), "invalid reference to facility: no facility at index 7");

        let err = SolverError::ScoreDriftDetected {
            iteration: 10,
            tracked: HardSoftScore::new(0, -5),
            recomputed: HardSoftScore::new(0, -4),
        };
        assert!(err.to_string().contains("0hard/-5soft"));
    }
}
