//! Checkpoint records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded decision with its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub key: String,
    pub rationale: String,
}

impl Decision {
    pub fn new(key: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rationale: rationale.into(),
        }
    }
}

/// How the next session picks the work back up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeInstructions {
    /// Context to reload, in order.
    #[serde(default)]
    pub context_refs: Vec<String>,
    /// The exact next action.
    #[serde(default)]
    pub next_action: String,
}

/// The agent-supplied part of a checkpoint.
///
/// This is the payload read from `checkpoint --file`; the store stamps the
/// rest when it appends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDraft {
    #[serde(default)]
    pub completed_items: Vec<String>,
    #[serde(default)]
    pub in_progress: String,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub resume: ResumeInstructions,
}

impl CheckpointDraft {
    /// Draft with only a next action set.
    pub fn with_next_action(next_action: impl Into<String>) -> Self {
        Self {
            resume: ResumeInstructions {
                context_refs: Vec::new(),
                next_action: next_action.into(),
            },
            ..Self::default()
        }
    }

    pub fn completed(mut self, item: impl Into<String>) -> Self {
        self.completed_items.push(item.into());
        self
    }

    pub fn decision(mut self, key: impl Into<String>, rationale: impl Into<String>) -> Self {
        self.decisions.push(Decision::new(key, rationale));
        self
    }
}

/// Session identity and usage stamped on a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMeta {
    pub phase: String,
    pub session_seq: u32,
    pub usage: f64,
    /// Written because the session reached the usage ceiling.
    pub forced: bool,
}

/// An immutable snapshot written by one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: String,
    pub session_seq: u32,
    /// Per-phase append order, starting at 1.
    pub sequence: u32,
    pub written_at: DateTime<Utc>,
    pub usage: f64,
    #[serde(default)]
    pub forced: bool,
    #[serde(flatten)]
    pub draft: CheckpointDraft,
}

impl Checkpoint {
    pub fn next_action(&self) -> &str {
        &self.draft.resume.next_action
    }
}
