//! Project status summary.

use crate::dag::resolver;
use crate::lifecycle::PhaseState;
use crate::project::Project;
use crate::review::{FindingSeverity, Verdict};
use serde::Serialize;

/// One phase in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub id: String,
    pub label: String,
    pub state: PhaseState,
    pub depends_on: Vec<String>,
    pub sessions: usize,
    /// Active session number and agent
    pub active: Option<(u32, String)>,
    pub review_round: u32,
    pub last_verdict: Option<Verdict>,
    pub open_blockers: usize,
    pub open_findings: usize,
}

/// Counts per state, completion, ready set and open findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub project: String,
    pub total: usize,
    /// Every state with its count, in lifecycle order
    pub counts: Vec<(PhaseState, usize)>,
    pub passed: usize,
    pub percent_complete: f64,
    /// Candidates in scheduling order
    pub schedulable: Vec<String>,
    pub phases: Vec<PhaseSummary>,
}

impl StatusSummary {
    pub fn from_project(project: &Project) -> Self {
        let total = project.phases.len();
        let passed = project.count_in_state(PhaseState::Passed);
        let percent_complete = if total == 0 {
            100.0
        } else {
            passed as f64 * 100.0 / total as f64
        };

        let counts = PhaseState::all()
            .into_iter()
            .map(|s| (s, project.count_in_state(s)))
            .collect();

        let schedulable = resolver::candidates(project)
            .into_iter()
            .map(|p| p.id().to_string())
            .collect();

        let phases = project
            .phases
            .iter()
            .map(|p| PhaseSummary {
                id: p.id().to_string(),
                label: p.def.display_name().to_string(),
                state: p.state,
                depends_on: p.def.depends_on.clone(),
                sessions: p.sessions.len(),
                active: p.active_session().map(|s| (s.seq, s.agent.clone())),
                review_round: p.review_round,
                last_verdict: p.latest_review().map(|r| r.verdict),
                open_blockers: p
                    .open_findings
                    .iter()
                    .filter(|f| f.severity() == FindingSeverity::Blocker)
                    .count(),
                open_findings: p.open_findings.len(),
            })
            .collect();

        Self {
            project: project.name.clone(),
            total,
            counts,
            passed,
            percent_complete,
            schedulable,
            phases,
        }
    }

    /// Count for one state.
    pub fn count(&self, state: PhaseState) -> usize {
        self.counts
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Phases with open findings, as `(id, open, blockers)`.
    pub fn with_open_findings(&self) -> Vec<(&str, usize, usize)> {
        self.phases
            .iter()
            .filter(|p| p.open_findings > 0)
            .map(|p| (p.id.as_str(), p.open_findings, p.open_blockers))
            .collect()
    }
}
