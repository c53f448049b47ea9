//! Typed error hierarchy for the phasegate orchestrator.
//!
//! Two enums cover the two layers:
//! - `StorageError`: raw backend faults from the checkpoint and project stores
//! - `OrchestratorError`: every rejected orchestrator operation, naming the
//!   invariant it would have violated
//!
//! Graph and transition errors leave project state untouched; storage errors
//! are the only class that is retried (see `checkpoint::store`).

use crate::lifecycle::{LifecycleEvent, PhaseState};
use thiserror::Error;

/// Exit code for validation failures (cycles, unknown phases, bad input).
pub const EXIT_VALIDATION: i32 = 1;

/// Exit code for rejected state transitions.
pub const EXIT_INVALID_TRANSITION: i32 = 2;

/// Faults raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Corrupt record at line {line} of {path}: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Injected fault: {0}")]
    Injected(String),
}

/// Errors from orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Cycle detected in phase dependencies: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    #[error("Unknown dependency '{dependency}' in phase '{phase}': no phase with that id exists")]
    UnknownDependency { phase: String, dependency: String },

    #[error("Duplicate phase id: {0}")]
    DuplicatePhase(String),

    #[error("Phase '{0}' not found")]
    PhaseNotFound(String),

    #[error("Invalid transition for phase '{phase}': cannot apply {event} in state {from}")]
    InvalidTransition {
        phase: String,
        from: PhaseState,
        event: LifecycleEvent,
    },

    #[error(
        "Stale review for phase '{phase}': phase is {state} at review round {round}, \
         submission targeted round {targeted}"
    )]
    StaleReview {
        phase: String,
        state: PhaseState,
        round: u32,
        targeted: u32,
    },

    #[error("Session {session} of phase '{phase}' is not the active session")]
    SessionNotActive { phase: String, session: u32 },

    #[error("Finding '{finding}' is not an open finding of phase '{phase}'")]
    UnknownFinding { phase: String, finding: String },

    #[error("Phase '{phase}' is already {state}; a new unmet prerequisite cannot be added")]
    PhaseAlreadyStarted { phase: String, state: PhaseState },

    #[error("Usage fraction {0} is outside 0.0..=1.0")]
    InvalidUsage(f64),

    #[error("Checkpoint write failed after {attempts} attempts: {source}")]
    CheckpointWriteFailed {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl OrchestratorError {
    /// Process exit code for this error when surfaced through the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidTransition { .. }
            | Self::StaleReview { .. }
            | Self::SessionNotActive { .. } => EXIT_INVALID_TRANSITION,
            _ => EXIT_VALIDATION,
        }
    }

    /// Whether the error is a storage fault. These are fatal to a run.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::CheckpointWriteFailed { .. } | Self::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_detected_names_the_cycle() {
        let err = OrchestratorError::CycleDetected {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Cycle detected in phase dependencies: a -> b -> a"
        );
        assert!(!err.is_storage_error());
        assert_eq!(err.exit_code(), EXIT_VALIDATION);
    }

    #[test]
    fn transition_errors_map_to_exit_code_two() {
        let err = OrchestratorError::InvalidTransition {
            phase: "scaffold".into(),
            from: PhaseState::Passed,
            event: LifecycleEvent::Reopen,
        };
        assert_eq!(err.exit_code(), EXIT_INVALID_TRANSITION);
        assert!(err.to_string().contains("scaffold"));

        let stale = OrchestratorError::StaleReview {
            phase: "z".into(),
            state: PhaseState::Passed,
            round: 1,
            targeted: 1,
        };
        assert_eq!(stale.exit_code(), EXIT_INVALID_TRANSITION);

        let session = OrchestratorError::SessionNotActive {
            phase: "z".into(),
            session: 3,
        };
        assert_eq!(session.exit_code(), EXIT_INVALID_TRANSITION);
    }

    #[test]
    fn checkpoint_write_failed_keeps_source() {
        use std::error::Error as _;
        let err = OrchestratorError::CheckpointWriteFailed {
            attempts: 4,
            source: StorageError::Injected("disk full".into()),
        };
        assert!(err.to_string().contains("4 attempts"));
        assert!(err.source().is_some());
        assert!(err.is_storage_error());
        assert_eq!(err.exit_code(), EXIT_VALIDATION);
    }

    #[test]
    fn storage_error_converts_into_orchestrator_error() {
        let err: OrchestratorError = StorageError::Injected("read-only".into()).into();
        assert!(matches!(
            err,
            OrchestratorError::Storage(StorageError::Injected(_))
        ));
        assert!(err.is_storage_error());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StorageError::Injected("x".into()));
        assert_std_error(&OrchestratorError::PhaseNotFound("x".into()));
    }
}
