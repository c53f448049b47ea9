//! Orchestrator facade and project persistence.

pub mod service;
pub mod state;
pub mod summary;

pub use service::{
    CheckpointOutcome, OPERATOR, OrchestratorService, OrchestratorSettings, SessionGrant,
};
pub use state::{FileStateStore, MemoryStateStore, ProjectLock, StateStore};
pub use summary::{PhaseSummary, StatusSummary};
