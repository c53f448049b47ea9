//! Parallel execution coordinator.
//!
//! Hands schedulable phases to available agents. Two phases may be worked
//! on at the same time only if neither is a transitive prerequisite of the
//! other and they share no exclusion tag. A phase never has more than one
//! active session, and `max_parallel` caps active sessions project-wide.

use crate::dag::builder::PhaseGraph;
use crate::dag::resolver;
use crate::lifecycle::PhaseState;
use crate::phase::PhaseDef;
use crate::project::Project;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum active sessions across the project
    pub max_parallel: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_parallel: 4 }
    }
}

impl SchedulerConfig {
    /// Create a config with specific max parallelism.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }
}

/// One phase handed to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub phase: String,
    pub agent: String,
    /// State the phase was in when picked; anything but READY is a resume
    pub from: PhaseState,
}

impl Assignment {
    pub fn is_resume(&self) -> bool {
        self.from != PhaseState::Ready
    }
}

/// Whether two phases must not be worked on at the same time.
pub fn conflicts(graph: &PhaseGraph, a: &PhaseDef, b: &PhaseDef) -> bool {
    if a.id == b.id {
        return true;
    }
    if graph.related(&a.id, &b.id) {
        return true;
    }
    a.exclusive_tags
        .iter()
        .any(|tag| b.exclusive_tags.contains(tag))
}

/// The coordinator. Borrows the validated graph for one planning cycle.
#[derive(Debug)]
pub struct Coordinator<'a> {
    graph: &'a PhaseGraph,
    config: SchedulerConfig,
}

impl<'a> Coordinator<'a> {
    pub fn new(graph: &'a PhaseGraph, config: SchedulerConfig) -> Self {
        Self { graph, config }
    }

    /// Free slots under `max_parallel`.
    pub fn free_slots(&self, project: &Project) -> usize {
        self.config
            .max_parallel
            .saturating_sub(project.active_session_count())
    }

    /// Assign candidates to agents in readiness order.
    ///
    /// Candidates that conflict with an active phase, or with one picked
    /// earlier in this call, are skipped; the next candidate gets the agent.
    pub fn schedule(&self, project: &Project, agents: &[String]) -> Vec<Assignment> {
        let mut slots = self.free_slots(project);
        let mut agents = agents.iter();
        let mut running: Vec<&PhaseDef> = project
            .phases
            .iter()
            .filter(|p| p.has_active_session())
            .map(|p| &p.def)
            .collect();
        let mut assignments = Vec::new();

        for candidate in resolver::candidates(project) {
            if slots == 0 {
                debug!("No free slots left");
                break;
            }
            if let Some(blocking) = running
                .iter()
                .find(|r| conflicts(self.graph, r, &candidate.def))
            {
                debug!(
                    phase = candidate.id(),
                    conflicts_with = %blocking.id,
                    "Skipping candidate"
                );
                continue;
            }
            let Some(agent) = agents.next() else {
                break;
            };
            assignments.push(Assignment {
                phase: candidate.id().to_string(),
                agent: agent.clone(),
                from: candidate.state,
            });
            running.push(&candidate.def);
            slots -= 1;
        }

        assignments
    }
}
