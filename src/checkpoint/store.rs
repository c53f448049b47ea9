//! Append-only checkpoint storage.
//!
//! A [`CheckpointStore`] keeps an in-memory per-phase index over a
//! [`CheckpointBackend`]. Appends go to the backend first, with bounded
//! retry and linear backoff; the index only changes once the backend
//! accepted the record.

use super::types::{Checkpoint, CheckpointDraft, CheckpointMeta};
use crate::errors::{OrchestratorError, Result, StorageError};
use chrono::Utc;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Durable storage for checkpoint records.
pub trait CheckpointBackend: Send {
    /// Persist one record. Must not return until the record is durable.
    fn append(&mut self, checkpoint: &Checkpoint) -> std::result::Result<(), StorageError>;

    /// Every persisted record in append order.
    fn load_all(&self) -> std::result::Result<Vec<Checkpoint>, StorageError>;
}

/// In-memory backend for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Vec<Checkpoint>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointBackend for MemoryBackend {
    fn append(&mut self, checkpoint: &Checkpoint) -> std::result::Result<(), StorageError> {
        self.records.push(checkpoint.clone());
        Ok(())
    }

    fn load_all(&self) -> std::result::Result<Vec<Checkpoint>, StorageError> {
        Ok(self.records.clone())
    }
}

/// JSON-lines file backend. Each append takes an exclusive file lock and
/// syncs before releasing it.
#[derive(Debug, Clone)]
pub struct JsonlBackend {
    path: PathBuf,
}

impl JsonlBackend {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CheckpointBackend for JsonlBackend {
    fn append(&mut self, checkpoint: &Checkpoint) -> std::result::Result<(), StorageError> {
        let mut line = serde_json::to_string(checkpoint).map_err(StorageError::Encode)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        file.lock_exclusive().map_err(|e| self.io_err(e))?;
        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.sync_data());
        // Lock is also released when the handle drops
        let _ = FileExt::unlock(&file);
        written.map_err(|e| self.io_err(e))
    }

    fn load_all(&self) -> std::result::Result<Vec<Checkpoint>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| StorageError::Corrupt {
                    path: self.path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }
}

/// Bounded retry for backend appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Checkpoint store with a per-phase index.
pub struct CheckpointStore {
    backend: Box<dyn CheckpointBackend>,
    policy: RetryPolicy,
    by_phase: HashMap<String, Vec<Checkpoint>>,
}

impl CheckpointStore {
    /// Open a store over `backend`, indexing everything it already holds.
    pub fn open(backend: Box<dyn CheckpointBackend>, policy: RetryPolicy) -> Result<Self> {
        let mut by_phase: HashMap<String, Vec<Checkpoint>> = HashMap::new();
        for checkpoint in backend.load_all()? {
            by_phase
                .entry(checkpoint.phase.clone())
                .or_default()
                .push(checkpoint);
        }
        Ok(Self {
            backend,
            policy,
            by_phase,
        })
    }

    /// In-memory store with the default retry policy.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            policy: RetryPolicy::default(),
            by_phase: HashMap::new(),
        }
    }

    /// Append a checkpoint for a session.
    ///
    /// Storage faults are retried `max_retries` times; after that the
    /// fault surfaces as `CheckpointWriteFailed` and nothing is indexed.
    pub fn append(&mut self, meta: CheckpointMeta, draft: CheckpointDraft) -> Result<Checkpoint> {
        if !(0.0..=1.0).contains(&meta.usage) {
            return Err(OrchestratorError::InvalidUsage(meta.usage));
        }

        let sequence = self.history(&meta.phase).len() as u32 + 1;
        let checkpoint = Checkpoint {
            phase: meta.phase,
            session_seq: meta.session_seq,
            sequence,
            written_at: Utc::now(),
            usage: meta.usage,
            forced: meta.forced,
            draft,
        };

        let attempts = self.policy.max_retries + 1;
        let mut attempt = 1;
        loop {
            match self.backend.append(&checkpoint) {
                Ok(()) => break,
                Err(e) if attempt < attempts => {
                    warn!(
                        phase = %checkpoint.phase,
                        attempt,
                        attempts,
                        "Checkpoint write failed, retrying: {}",
                        e
                    );
                    std::thread::sleep(self.policy.backoff * attempt);
                    attempt += 1;
                }
                Err(source) => {
                    warn!(
                        phase = %checkpoint.phase,
                        attempts,
                        "Checkpoint write failed permanently: {}",
                        source
                    );
                    return Err(OrchestratorError::CheckpointWriteFailed { attempts, source });
                }
            }
        }

        debug!(
            phase = %checkpoint.phase,
            session = checkpoint.session_seq,
            sequence = checkpoint.sequence,
            usage = checkpoint.usage,
            forced = checkpoint.forced,
            "Checkpoint appended"
        );

        self.by_phase
            .entry(checkpoint.phase.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(checkpoint)
    }

    /// Most recent checkpoint across every session of the phase.
    pub fn latest(&self, phase: &str) -> Option<&Checkpoint> {
        self.history(phase).last()
    }

    /// Every checkpoint of the phase in append order.
    pub fn history(&self, phase: &str) -> &[Checkpoint] {
        self.by_phase.get(phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of indexed checkpoints.
    pub fn len(&self) -> usize {
        self.by_phase.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("policy", &self.policy)
            .field("checkpoints", &self.len())
            .finish()
    }
}
