//! Checkpoint store for resumable sessions.
//!
//! - [`types`]: checkpoint payloads and records
//! - [`store`]: backends, retry policy and the per-phase index

pub mod store;
pub mod types;

pub use store::{CheckpointBackend, CheckpointStore, JsonlBackend, MemoryBackend, RetryPolicy};
pub use types::{Checkpoint, CheckpointDraft, CheckpointMeta, Decision, ResumeInstructions};
