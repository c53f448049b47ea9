//! Project aggregate: phases with their runtime records, sessions, reviews
//! and the audit log.
//!
//! Everything here is plain data plus small accessors. The orchestrator
//! service is the only writer; it goes through `lifecycle::transition` for
//! every state change and appends an [`AuditEntry`] for each.

use crate::lifecycle::PhaseState;
use crate::phase::PhaseDef;
use crate::review::{Finding, QualityGateReview};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    /// Active and has written at least one checkpoint
    Checkpointed,
    Ended,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Agent declared the phase complete
    Completed,
    /// Usage reached the session ceiling
    Yielded,
    /// Agent handed off with a final checkpoint
    HandedOff,
    /// Phase was aborted
    Aborted,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Yielded => "yielded",
            Self::HandedOff => "handed off",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// One bounded work interval of an agent against a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Monotonic per phase, starting at 1
    pub seq: u32,
    pub agent: String,
    /// Usage fraction reported by the latest checkpoint
    pub usage: f64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Per-phase sequence of this session's latest checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_checkpoint: Option<u32>,
}

impl Session {
    pub fn new(seq: u32, agent: &str) -> Self {
        Self {
            seq,
            agent: agent.to_string(),
            usage: 0.0,
            status: SessionStatus::Active,
            end_reason: None,
            started_at: Utc::now(),
            ended_at: None,
            latest_checkpoint: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Ended
    }

    pub(crate) fn end(&mut self, reason: EndReason) {
        self.status = SessionStatus::Ended;
        self.end_reason = Some(reason);
        self.ended_at = Some(Utc::now());
    }
}

/// Fix ids an agent claimed when declaring a round complete.
///
/// Claims are informational. Only a review can resolve a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixClaim {
    pub round: u32,
    pub session_seq: u32,
    pub finding_ids: Vec<String>,
}

/// A phase definition plus its runtime record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    #[serde(flatten)]
    pub def: PhaseDef,
    pub state: PhaseState,
    /// Logical time the phase last became schedulable
    #[serde(default)]
    pub schedulable_at: u64,
    /// Logical time the phase passed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed_at: Option<u64>,
    /// Incremented on every declare-complete
    #[serde(default)]
    pub review_round: u32,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub reviews: Vec<QualityGateReview>,
    /// Blocker and fix-required findings still awaiting confirmation
    #[serde(default)]
    pub open_findings: Vec<Finding>,
    /// Deliverable references from the latest declare-complete
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub fix_claims: Vec<FixClaim>,
}

impl PhaseRecord {
    pub fn new(def: PhaseDef) -> Self {
        Self {
            def,
            state: PhaseState::Pending,
            schedulable_at: 0,
            passed_at: None,
            review_round: 0,
            sessions: Vec::new(),
            reviews: Vec::new(),
            open_findings: Vec::new(),
            deliverables: Vec::new(),
            fix_claims: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.iter().rev().find(|s| s.is_active())
    }

    pub(crate) fn active_session_mut(&mut self) -> Option<&mut Session> {
        self.sessions.iter_mut().rev().find(|s| s.is_active())
    }

    pub fn has_active_session(&self) -> bool {
        self.active_session().is_some()
    }

    pub fn next_session_seq(&self) -> u32 {
        self.sessions.last().map_or(1, |s| s.seq + 1)
    }

    pub fn latest_review(&self) -> Option<&QualityGateReview> {
        self.reviews.last()
    }

    /// Agent of the most recent session, if any.
    pub fn last_agent(&self) -> Option<&str> {
        self.sessions.last().map(|s| s.agent.as_str())
    }

    /// Candidate for the coordinator: schedulable and not already worked on.
    pub fn is_candidate(&self) -> bool {
        self.state.is_schedulable() && !self.has_active_session()
    }
}

/// Kinds of audit log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Defined,
    PhaseAdded,
    DependencyAdded,
    Transition,
    SessionOpened,
    SessionEnded,
    Checkpoint,
    FixClaimed,
    Review,
    Reverify,
    Revalidate,
    Reopen,
    Abort,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Defined => "defined",
            Self::PhaseAdded => "phase-added",
            Self::DependencyAdded => "dependency-added",
            Self::Transition => "transition",
            Self::SessionOpened => "session-opened",
            Self::SessionEnded => "session-ended",
            Self::Checkpoint => "checkpoint",
            Self::FixClaimed => "fix-claimed",
            Self::Review => "review",
            Self::Reverify => "reverify",
            Self::Revalidate => "revalidate",
            Self::Reopen => "reopen",
            Self::Abort => "abort",
        };
        write!(f, "{}", s)
    }
}

/// One entry in the project audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Logical time
    pub at: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub kind: AuditKind,
    pub detail: String,
}

/// The root aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Logical clock, advanced on every recorded event
    pub clock: u64,
    pub phases: Vec<PhaseRecord>,
    #[serde(default)]
    pub log: Vec<AuditEntry>,
}

impl Project {
    /// New project over already-validated phase definitions.
    pub fn new(name: &str, defs: Vec<PhaseDef>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
            clock: 0,
            phases: defs.into_iter().map(PhaseRecord::new).collect(),
            log: Vec::new(),
        }
    }

    pub fn phase(&self, id: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.def.id == id)
    }

    pub fn phase_mut(&mut self, id: &str) -> Option<&mut PhaseRecord> {
        self.phases.iter_mut().find(|p| p.def.id == id)
    }

    pub fn defs(&self) -> Vec<PhaseDef> {
        self.phases.iter().map(|p| p.def.clone()).collect()
    }

    /// Advance the logical clock and return the new time.
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Append an audit entry at the current logical time.
    pub fn record(&mut self, phase: Option<&str>, kind: AuditKind, detail: impl Into<String>) {
        self.log.push(AuditEntry {
            at: self.clock,
            timestamp: Utc::now(),
            phase: phase.map(str::to_string),
            kind,
            detail: detail.into(),
        });
    }

    pub fn active_session_count(&self) -> usize {
        self.phases.iter().filter(|p| p.has_active_session()).count()
    }

    pub fn count_in_state(&self, state: PhaseState) -> usize {
        self.phases.iter().filter(|p| p.state == state).count()
    }

    pub fn all_passed(&self) -> bool {
        self.phases.iter().all(|p| p.state.is_passed())
    }

    /// Audit entries for one phase, in order.
    pub fn phase_log(&self, id: &str) -> Vec<&AuditEntry> {
        self.log
            .iter()
            .filter(|e| e.phase.as_deref() == Some(id))
            .collect()
    }
}
