//! Phase lifecycle state machine.
//!
//! A pure transition function over `(PhaseState, LifecycleEvent)`: no I/O, no
//! clock, no storage. It returns the next state plus the side effects the
//! orchestrator service must carry out. Pairs outside the transition table are
//! rejected with `InvalidTransition` and the caller's state is left as it was.

use crate::errors::{OrchestratorError, Result};
use crate::review::Verdict;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Waiting on prerequisites
    #[default]
    Pending,
    /// All prerequisites passed, waiting for an agent
    Ready,
    /// An agent owns (or owned) a session on this phase
    InProgress,
    /// Deliverables declared complete, waiting for a quality gate verdict
    UnderReview,
    /// Quality gate passed
    Passed,
    /// Quality gate found locally fixable blockers
    ReviseRequired,
    /// Needs external action before work can continue
    Blocked,
}

impl PhaseState {
    /// Terminal for automatic scheduling purposes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Blocked)
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// States an agent can be handed work in.
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Ready | Self::InProgress | Self::ReviseRequired)
    }

    pub fn all() -> [PhaseState; 7] {
        [
            Self::Pending,
            Self::Ready,
            Self::InProgress,
            Self::UnderReview,
            Self::Passed,
            Self::ReviseRequired,
            Self::Blocked,
        ]
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Passed => "PASSED",
            Self::ReviseRequired => "REVISE_REQUIRED",
            Self::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

/// Events that drive phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "verdict", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Every prerequisite reached PASSED
    PrerequisitesPassed,
    /// An agent was assigned to a READY phase
    AgentAssigned,
    /// An agent picked the phase back up after a yield or a REVISE verdict
    AgentResumed,
    /// The active session's agent declared the deliverables complete
    DeclaredComplete,
    /// The quality gate produced a verdict
    Verdict(Verdict),
    /// External reopen of a BLOCKED phase
    Reopen,
    /// External abort
    Abort,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrerequisitesPassed => write!(f, "prerequisites-passed"),
            Self::AgentAssigned => write!(f, "agent-assigned"),
            Self::AgentResumed => write!(f, "agent-resumed"),
            Self::DeclaredComplete => write!(f, "declared-complete"),
            Self::Verdict(v) => write!(f, "verdict {}", v),
            Self::Reopen => write!(f, "reopen"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open the next session for the assigned agent
    OpenSession,
    /// End the active session
    EndSession,
    /// Start a new review round for the declared deliverables
    StartReviewRound,
    /// Recompute readiness for dependents
    NotifyResolver,
    /// Keep the open findings and require a fix before re-review
    RequireFix,
    /// Require an external reopen
    RequireReopen,
    /// Clear open blocker markers, history is kept
    ClearBlockerMarkers,
}

/// Pure transition function.
///
/// `active_session` tells whether the phase currently has an open session;
/// resume is only valid without one, declare-complete only with one.
pub fn transition(
    phase: &str,
    state: PhaseState,
    event: LifecycleEvent,
    active_session: bool,
) -> Result<(PhaseState, Vec<Action>)> {
    use LifecycleEvent as E;
    use PhaseState as S;

    let next = match (state, event) {
        (S::Pending, E::PrerequisitesPassed) => (S::Ready, vec![]),
        (S::Ready, E::AgentAssigned) => (S::InProgress, vec![Action::OpenSession]),
        (S::InProgress, E::AgentResumed) if !active_session => {
            (S::InProgress, vec![Action::OpenSession])
        }
        (S::ReviseRequired, E::AgentResumed) => (S::InProgress, vec![Action::OpenSession]),
        (S::InProgress, E::DeclaredComplete) if active_session => (
            S::UnderReview,
            vec![Action::EndSession, Action::StartReviewRound],
        ),
        (S::UnderReview, E::Verdict(Verdict::Pass)) => (S::Passed, vec![Action::NotifyResolver]),
        (S::UnderReview, E::Verdict(Verdict::Revise)) => {
            (S::ReviseRequired, vec![Action::RequireFix])
        }
        (S::UnderReview, E::Verdict(Verdict::Blocked)) => {
            (S::Blocked, vec![Action::RequireReopen])
        }
        (S::Blocked, E::Reopen) => (S::Ready, vec![Action::ClearBlockerMarkers]),
        (S::Ready, E::Abort) => (S::Blocked, vec![Action::RequireReopen]),
        (S::InProgress, E::Abort) => {
            let mut actions = Vec::new();
            if active_session {
                actions.push(Action::EndSession);
            }
            actions.push(Action::RequireReopen);
            (S::Blocked, actions)
        }
        (from, event) => {
            return Err(OrchestratorError::InvalidTransition {
                phase: phase.to_string(),
                from,
                event,
            });
        }
    };

    Ok(next)
}
