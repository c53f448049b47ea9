//! The orchestrator facade.
//!
//! `OrchestratorService` is the single writer for a project. Every mutating
//! call works on a copy of the project, persists it through the
//! `StateStore`, and only then replaces the in-memory state. A rejected or
//! failed call leaves the project exactly as it was.

use crate::checkpoint::{Checkpoint, CheckpointDraft, CheckpointMeta, CheckpointStore};
use crate::dag::resolver::{self, ReadyPhase};
use crate::dag::{Coordinator, DagBuilder, PhaseGraph, SchedulerConfig};
use crate::errors::{OrchestratorError, Result};
use crate::lifecycle::{self, Action, LifecycleEvent, PhaseState};
use crate::orchestrator::state::{MemoryStateStore, StateStore};
use crate::orchestrator::summary::StatusSummary;
use crate::phase::PhaseDef;
use crate::phasegate_config::PhasegateConfig;
use crate::project::{AuditKind, EndReason, FixClaim, PhaseRecord, Project, Session, SessionStatus};
use crate::review::{self, Finding, GateOutcome, QualityGateReview, ReviewKind};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Reviewer name recorded for operator-triggered revalidation.
pub const OPERATOR: &str = "operator";

/// Resolved runtime settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    /// Usage fraction at which a checkpoint forces the session to yield
    pub usage_ceiling: f64,
    /// Open a follow-up session for the same agent after a forced yield
    pub auto_continue: bool,
    pub scheduler: SchedulerConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            usage_ceiling: 0.8,
            auto_continue: true,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &PhasegateConfig) -> Self {
        Self {
            usage_ceiling: config.usage_ceiling(),
            auto_continue: config.auto_continue(),
            scheduler: config.scheduler_config(),
        }
    }

    pub fn with_usage_ceiling(mut self, ceiling: f64) -> Self {
        self.usage_ceiling = ceiling;
        self
    }

    pub fn with_auto_continue(mut self, auto_continue: bool) -> Self {
        self.auto_continue = auto_continue;
        self
    }

    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.scheduler = self.scheduler.with_max_parallel(max);
        self
    }
}

/// A session opened for an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub phase: String,
    pub agent: String,
    pub session_seq: u32,
    /// State the phase was picked from
    pub from: PhaseState,
    /// Latest checkpoint of the phase, the agent resumes from here
    pub resume_point: Option<Checkpoint>,
    /// Findings the agent must address (REVISE resumes)
    pub open_findings: Vec<Finding>,
}

impl SessionGrant {
    pub fn is_resume(&self) -> bool {
        self.from != PhaseState::Ready
    }
}

/// Result of recording a checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointOutcome {
    pub checkpoint: Checkpoint,
    /// The usage ceiling was reached and the session was ended
    pub yielded: bool,
    /// Follow-up session opened by auto-continue
    pub next_session: Option<u32>,
}

/// Side-effect context for transition actions.
struct Effects<'a> {
    agent: Option<&'a str>,
    end_reason: EndReason,
}

impl Effects<'_> {
    fn none() -> Self {
        Self {
            agent: None,
            end_reason: EndReason::Completed,
        }
    }
}

/// Orchestrator over one project.
pub struct OrchestratorService {
    project: Project,
    graph: PhaseGraph,
    checkpoints: CheckpointStore,
    state: Box<dyn StateStore>,
    settings: OrchestratorSettings,
}

impl OrchestratorService {
    /// Validate `defs` and create a new project.
    ///
    /// Root phases are promoted to READY immediately.
    pub fn define(
        name: &str,
        defs: Vec<PhaseDef>,
        state: Box<dyn StateStore>,
        checkpoints: CheckpointStore,
        settings: OrchestratorSettings,
    ) -> Result<Self> {
        let graph = DagBuilder::new(defs.clone()).build()?;
        let mut project = Project::new(name, defs);
        project.record(
            None,
            AuditKind::Defined,
            format!("{} phases", project.phases.len()),
        );
        let unlocked = promote_ready(&mut project)?;
        info!(project = name, phases = graph.len(), ready = ?unlocked, "Project defined");

        let mut service = Self {
            project: project.clone(),
            graph,
            checkpoints,
            state,
            settings,
        };
        service.commit(project)?;
        Ok(service)
    }

    /// Open a previously defined project, `None` if none was saved.
    pub fn open(
        state: Box<dyn StateStore>,
        checkpoints: CheckpointStore,
        settings: OrchestratorSettings,
    ) -> Result<Option<Self>> {
        let Some(project) = state.load()? else {
            return Ok(None);
        };
        let graph = DagBuilder::new(project.defs()).build()?;
        debug!(project = %project.name, clock = project.clock, "Project loaded");
        Ok(Some(Self {
            project,
            graph,
            checkpoints,
            state,
            settings,
        }))
    }

    /// Fully in-memory orchestrator with default settings.
    pub fn in_memory(name: &str, defs: Vec<PhaseDef>) -> Result<Self> {
        Self::define(
            name,
            defs,
            Box::new(MemoryStateStore::new()),
            CheckpointStore::in_memory(),
            OrchestratorSettings::default(),
        )
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn phase(&self, id: &str) -> Result<&PhaseRecord> {
        self.project
            .phase(id)
            .ok_or_else(|| OrchestratorError::PhaseNotFound(id.to_string()))
    }

    fn commit(&mut self, working: Project) -> Result<()> {
        self.state.save(&working)?;
        self.project = working;
        Ok(())
    }

    // Graph changes

    /// Add a phase to the project and revalidate the graph.
    pub fn add_phase(&mut self, def: PhaseDef) -> Result<()> {
        let mut defs = self.project.defs();
        defs.push(def.clone());
        let graph = DagBuilder::new(defs).build()?;

        let mut working = self.project.clone();
        let id = def.id.clone();
        working.phases.push(PhaseRecord::new(def));
        working.tick();
        working.record(Some(&id), AuditKind::PhaseAdded, "added");
        promote_ready(&mut working)?;

        self.commit(working)?;
        self.graph = graph;
        info!(phase = %id, "Phase added");
        Ok(())
    }

    /// Make `target` depend on `source` and revalidate the graph.
    ///
    /// A phase that already left PENDING only accepts a prerequisite that
    /// has passed.
    pub fn add_dependency(&mut self, source: &str, target: &str) -> Result<()> {
        let source_passed = self.phase(source)?.state.is_passed();
        let target_record = self.phase(target)?;
        if target_record.def.depends_on.iter().any(|d| d == source) {
            debug!(source, target, "Dependency already present");
            return Ok(());
        }
        if target_record.state != PhaseState::Pending && !source_passed {
            return Err(OrchestratorError::PhaseAlreadyStarted {
                phase: target.to_string(),
                state: target_record.state,
            });
        }

        let mut working = self.project.clone();
        if let Some(record) = working.phase_mut(target) {
            record.def.depends_on.push(source.to_string());
        }
        let graph = DagBuilder::new(working.defs()).build()?;

        working.tick();
        working.record(
            Some(target),
            AuditKind::DependencyAdded,
            format!("depends on {}", source),
        );
        promote_ready(&mut working)?;

        self.commit(working)?;
        self.graph = graph;
        info!(source, target, "Dependency added");
        Ok(())
    }

    // Work

    /// Pick the next candidate for `agent` and open a session.
    pub fn assign_next_ready_phase(&mut self, agent: &str) -> Result<Option<SessionGrant>> {
        Ok(self.schedule(&[agent.to_string()])?.into_iter().next())
    }

    /// Assign candidates to as many of `agents` as the coordinator allows.
    pub fn schedule(&mut self, agents: &[String]) -> Result<Vec<SessionGrant>> {
        let assignments =
            Coordinator::new(&self.graph, self.settings.scheduler).schedule(&self.project, agents);
        if assignments.is_empty() {
            debug!(agents = agents.len(), "Nothing to assign");
            return Ok(Vec::new());
        }

        let mut working = self.project.clone();
        let mut grants = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let event = if assignment.is_resume() {
                LifecycleEvent::AgentResumed
            } else {
                LifecycleEvent::AgentAssigned
            };
            let session_seq =
                open_session(&mut working, &assignment.phase, &assignment.agent, event)?;
            let open_findings = working
                .phase(&assignment.phase)
                .map(|p| p.open_findings.clone())
                .unwrap_or_default();
            info!(
                phase = %assignment.phase,
                agent = %assignment.agent,
                session = session_seq,
                resume = assignment.is_resume(),
                "Phase assigned"
            );
            grants.push(SessionGrant {
                resume_point: self.checkpoints.latest(&assignment.phase).cloned(),
                phase: assignment.phase,
                agent: assignment.agent,
                session_seq,
                from: assignment.from,
                open_findings,
            });
        }

        self.commit(working)?;
        Ok(grants)
    }

    /// Record a checkpoint for the active session.
    ///
    /// At or above the usage ceiling the checkpoint is marked forced and the
    /// session yields. With auto-continue the same agent gets the next
    /// session right away.
    pub fn record_checkpoint(
        &mut self,
        phase: &str,
        session_seq: u32,
        draft: CheckpointDraft,
        usage: f64,
    ) -> Result<CheckpointOutcome> {
        self.phase(phase)?;
        if !(0.0..=1.0).contains(&usage) {
            return Err(OrchestratorError::InvalidUsage(usage));
        }
        let agent = self.require_active_session(phase, session_seq)?.agent.clone();

        let forced = usage >= self.settings.usage_ceiling;
        let checkpoint = self.checkpoints.append(
            CheckpointMeta {
                phase: phase.to_string(),
                session_seq,
                usage,
                forced,
            },
            draft,
        )?;

        let mut working = self.project.clone();
        working.tick();
        if let Some(session) = working.phase_mut(phase).and_then(|p| p.active_session_mut()) {
            session.usage = usage;
            session.latest_checkpoint = Some(checkpoint.sequence);
            session.status = SessionStatus::Checkpointed;
        }
        working.record(
            Some(phase),
            AuditKind::Checkpoint,
            format!(
                "checkpoint {} from session {} at usage {:.2}{}",
                checkpoint.sequence,
                session_seq,
                usage,
                if forced { " (forced)" } else { "" }
            ),
        );

        let mut next_session = None;
        if forced {
            end_session(&mut working, phase, EndReason::Yielded);
            warn!(
                phase,
                session = session_seq,
                usage,
                ceiling = self.settings.usage_ceiling,
                "Usage ceiling reached, session yielded"
            );
            if self.settings.auto_continue {
                let seq = open_session(&mut working, phase, &agent, LifecycleEvent::AgentResumed)?;
                info!(phase, agent = %agent, session = seq, "Session continued");
                next_session = Some(seq);
            }
        }

        self.commit(working)?;
        Ok(CheckpointOutcome {
            checkpoint,
            yielded: forced,
            next_session,
        })
    }

    /// End the active session with a final checkpoint so another agent can
    /// pick the phase up.
    pub fn hand_off(
        &mut self,
        phase: &str,
        session_seq: u32,
        draft: CheckpointDraft,
    ) -> Result<Checkpoint> {
        self.phase(phase)?;
        let usage = self.require_active_session(phase, session_seq)?.usage;

        let checkpoint = self.checkpoints.append(
            CheckpointMeta {
                phase: phase.to_string(),
                session_seq,
                usage,
                forced: false,
            },
            draft,
        )?;

        let mut working = self.project.clone();
        working.tick();
        if let Some(session) = working.phase_mut(phase).and_then(|p| p.active_session_mut()) {
            session.latest_checkpoint = Some(checkpoint.sequence);
        }
        working.record(
            Some(phase),
            AuditKind::Checkpoint,
            format!(
                "hand-off checkpoint {} from session {}",
                checkpoint.sequence, session_seq
            ),
        );
        end_session(&mut working, phase, EndReason::HandedOff);

        self.commit(working)?;
        info!(phase, session = session_seq, "Session handed off");
        Ok(checkpoint)
    }

    /// Declare the phase's deliverables complete and start a review round.
    ///
    /// `claimed_fixes` are recorded as claims only; open findings stay open
    /// until a reviewer confirms them. Returns the new review round.
    pub fn declare_complete(
        &mut self,
        phase: &str,
        deliverables: Vec<String>,
        claimed_fixes: Vec<String>,
    ) -> Result<u32> {
        let mut working = self.project.clone();
        let session_seq = working
            .phase(phase)
            .ok_or_else(|| OrchestratorError::PhaseNotFound(phase.to_string()))?
            .active_session()
            .map(|s| s.seq)
            .unwrap_or(0);

        let actions = apply_event(&mut working, phase, LifecycleEvent::DeclaredComplete)?;
        run_actions(&mut working, phase, &actions, &Effects::none())?;

        let Some(record) = working.phase_mut(phase) else {
            return Err(OrchestratorError::PhaseNotFound(phase.to_string()));
        };
        record.deliverables = deliverables;
        let round = record.review_round;
        if !claimed_fixes.is_empty() {
            record.fix_claims.push(FixClaim {
                round,
                session_seq,
                finding_ids: claimed_fixes.clone(),
            });
            working.record(
                Some(phase),
                AuditKind::FixClaimed,
                format!("claims fixed (unverified): {}", claimed_fixes.join(", ")),
            );
        }

        self.commit(working)?;
        info!(phase, round, "Phase declared complete");
        Ok(round)
    }

    // Reviews

    /// Apply a reviewer's findings to the current review round.
    ///
    /// `round` pins the submission to a round; a mismatch, or a phase that
    /// is not under review, is rejected as stale.
    pub fn submit_review(
        &mut self,
        phase: &str,
        reviewer: &str,
        findings: Vec<Finding>,
        confirmed_resolved: &[String],
        round: Option<u32>,
    ) -> Result<QualityGateReview> {
        self.require_under_review(phase, round)?;
        let record = self.phase(phase)?;
        let outcome = review::apply_review(
            phase,
            record.reviews.len() as u32 + 1,
            &record.open_findings,
            confirmed_resolved,
            findings,
        )?;
        self.conclude_review(phase, reviewer, ReviewKind::Review, outcome)
    }

    /// Confirm fixes for open findings and re-evaluate.
    pub fn reverify(
        &mut self,
        phase: &str,
        reviewer: &str,
        fixed: &[String],
    ) -> Result<QualityGateReview> {
        self.require_under_review(phase, None)?;
        let record = self.phase(phase)?;
        let outcome = review::reverify(
            phase,
            record.reviews.len() as u32 + 1,
            &record.open_findings,
            fixed,
        )?;
        self.conclude_review(phase, reviewer, ReviewKind::Reverify, outcome)
    }

    /// Operator re-evaluation of an UNDER_REVIEW phase's open findings.
    pub fn advance(&mut self, phase: &str) -> Result<QualityGateReview> {
        let record = self.phase(phase)?;
        if record.state != PhaseState::UnderReview {
            return Err(OrchestratorError::InvalidTransition {
                phase: phase.to_string(),
                from: record.state,
                event: LifecycleEvent::Verdict(review::evaluate(&record.open_findings)),
            });
        }
        let outcome = review::reverify(
            phase,
            record.reviews.len() as u32 + 1,
            &record.open_findings,
            &[],
        )?;
        self.conclude_review(phase, OPERATOR, ReviewKind::Revalidate, outcome)
    }

    fn conclude_review(
        &mut self,
        phase: &str,
        reviewer: &str,
        kind: ReviewKind,
        outcome: GateOutcome,
    ) -> Result<QualityGateReview> {
        let mut working = self.project.clone();
        let Some(record) = working.phase_mut(phase) else {
            return Err(OrchestratorError::PhaseNotFound(phase.to_string()));
        };
        let review = QualityGateReview {
            sequence: record.reviews.len() as u32 + 1,
            round: record.review_round,
            reviewer: reviewer.to_string(),
            kind,
            timestamp: Utc::now(),
            findings: outcome.evaluated,
            confirmed_resolved: outcome.resolved,
            verdict: outcome.verdict,
        };
        record.reviews.push(review.clone());
        record.open_findings = outcome.open;

        let audit_kind = match kind {
            ReviewKind::Review => AuditKind::Review,
            ReviewKind::Reverify => AuditKind::Reverify,
            ReviewKind::Revalidate => AuditKind::Revalidate,
        };
        working.tick();
        working.record(
            Some(phase),
            audit_kind,
            format!(
                "{} by {}: {} finding(s), {} resolved",
                review.verdict,
                reviewer,
                review.findings.len(),
                review.confirmed_resolved.len()
            ),
        );

        let actions = apply_event(&mut working, phase, LifecycleEvent::Verdict(review.verdict))?;
        let unlocked = run_actions(&mut working, phase, &actions, &Effects::none())?;

        self.commit(working)?;
        info!(
            phase,
            reviewer,
            round = review.round,
            verdict = %review.verdict,
            unlocked = ?unlocked,
            "Review applied"
        );
        Ok(review)
    }

    // Operator actions

    /// Return a BLOCKED phase to READY. Reviews and sessions are kept.
    pub fn reopen(&mut self, phase: &str) -> Result<()> {
        let mut working = self.project.clone();
        let actions = apply_event(&mut working, phase, LifecycleEvent::Reopen)?;
        run_actions(&mut working, phase, &actions, &Effects::none())?;
        working.record(Some(phase), AuditKind::Reopen, "reopened");
        self.commit(working)?;
        info!(phase, "Phase reopened");
        Ok(())
    }

    /// Force a READY or IN_PROGRESS phase to BLOCKED.
    pub fn abort(&mut self, phase: &str) -> Result<()> {
        let mut working = self.project.clone();
        let actions = apply_event(&mut working, phase, LifecycleEvent::Abort)?;
        run_actions(
            &mut working,
            phase,
            &actions,
            &Effects {
                agent: None,
                end_reason: EndReason::Aborted,
            },
        )?;
        working.record(Some(phase), AuditKind::Abort, "aborted");
        self.commit(working)?;
        warn!(phase, "Phase aborted");
        Ok(())
    }

    // Queries

    /// PENDING phases whose prerequisites have all passed.
    pub fn readiness(&self) -> Vec<ReadyPhase> {
        resolver::readiness(&self.project)
    }

    /// Waves for the outstanding work.
    pub fn waves(&self) -> Vec<Vec<String>> {
        resolver::remaining_waves(&self.graph, &self.project)
    }

    pub fn status_summary(&self) -> StatusSummary {
        StatusSummary::from_project(&self.project)
    }

    pub fn latest_checkpoint(&self, phase: &str) -> Result<Option<&Checkpoint>> {
        self.phase(phase)?;
        Ok(self.checkpoints.latest(phase))
    }

    pub fn history(&self, phase: &str) -> Result<&[Checkpoint]> {
        self.phase(phase)?;
        Ok(self.checkpoints.history(phase))
    }

    fn require_active_session(&self, phase: &str, session_seq: u32) -> Result<&Session> {
        let record = self.phase(phase)?;
        match record.active_session() {
            Some(session)
                if session.seq == session_seq && record.state == PhaseState::InProgress =>
            {
                Ok(session)
            }
            _ => Err(OrchestratorError::SessionNotActive {
                phase: phase.to_string(),
                session: session_seq,
            }),
        }
    }

    fn require_under_review(&self, phase: &str, round: Option<u32>) -> Result<()> {
        let record = self.phase(phase)?;
        let targeted = round.unwrap_or(record.review_round);
        if record.state != PhaseState::UnderReview || targeted != record.review_round {
            return Err(OrchestratorError::StaleReview {
                phase: phase.to_string(),
                state: record.state,
                round: record.review_round,
                targeted,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for OrchestratorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorService")
            .field("project", &self.project.name)
            .field("phases", &self.project.phases.len())
            .field("checkpoints", &self.checkpoints)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Apply one lifecycle event to a phase of `project`.
fn apply_event(project: &mut Project, phase: &str, event: LifecycleEvent) -> Result<Vec<Action>> {
    let record = project
        .phase_mut(phase)
        .ok_or_else(|| OrchestratorError::PhaseNotFound(phase.to_string()))?;
    let from = record.state;
    let (to, actions) = lifecycle::transition(phase, from, event, record.has_active_session())?;
    record.state = to;

    project.tick();
    project.record(
        Some(phase),
        AuditKind::Transition,
        format!("{} -> {} on {}", from, to, event),
    );
    debug!(phase, %from, %to, %event, "Transition");
    Ok(actions)
}

/// Carry out the side effects of a transition. Returns phases unlocked.
fn run_actions(
    project: &mut Project,
    phase: &str,
    actions: &[Action],
    effects: &Effects<'_>,
) -> Result<Vec<String>> {
    let now = project.clock;
    let mut unlocked = Vec::new();

    for action in actions {
        match action {
            Action::OpenSession => {
                let agent = effects.agent.unwrap_or_default();
                let Some(record) = project.phase_mut(phase) else {
                    continue;
                };
                let seq = record.next_session_seq();
                record.sessions.push(Session::new(seq, agent));
                project.record(
                    Some(phase),
                    AuditKind::SessionOpened,
                    format!("session {} for {}", seq, agent),
                );
            }
            Action::EndSession => end_session(project, phase, effects.end_reason),
            Action::StartReviewRound => {
                if let Some(record) = project.phase_mut(phase) {
                    record.review_round += 1;
                }
            }
            Action::NotifyResolver => {
                if let Some(record) = project.phase_mut(phase) {
                    record.passed_at = Some(now);
                }
                unlocked.extend(promote_ready(project)?);
            }
            Action::RequireFix => {
                if let Some(record) = project.phase_mut(phase) {
                    record.schedulable_at = now;
                }
            }
            Action::RequireReopen => {
                debug!(phase, "Phase requires reopen");
            }
            Action::ClearBlockerMarkers => {
                if let Some(record) = project.phase_mut(phase) {
                    record.open_findings.clear();
                    record.schedulable_at = now;
                }
            }
        }
    }

    Ok(unlocked)
}

/// Promote every PENDING phase whose prerequisites have all passed.
fn promote_ready(project: &mut Project) -> Result<Vec<String>> {
    let mut unlocked = Vec::new();
    for ready in resolver::readiness(project) {
        apply_event(project, &ready.id, LifecycleEvent::PrerequisitesPassed)?;
        if let Some(record) = project.phase_mut(&ready.id) {
            record.schedulable_at = ready.ready_at;
        }
        info!(phase = %ready.id, ready_at = ready.ready_at, "Phase ready");
        unlocked.push(ready.id);
    }
    Ok(unlocked)
}

/// Open a session through `event` and return its sequence number.
fn open_session(
    project: &mut Project,
    phase: &str,
    agent: &str,
    event: LifecycleEvent,
) -> Result<u32> {
    let actions = apply_event(project, phase, event)?;
    run_actions(
        project,
        phase,
        &actions,
        &Effects {
            agent: Some(agent),
            end_reason: EndReason::Completed,
        },
    )?;
    project
        .phase(phase)
        .and_then(|p| p.active_session())
        .map(|s| s.seq)
        .ok_or_else(|| OrchestratorError::SessionNotActive {
            phase: phase.to_string(),
            session: 0,
        })
}

fn end_session(project: &mut Project, phase: &str, reason: EndReason) {
    let now = project.clock;
    let Some(record) = project.phase_mut(phase) else {
        return;
    };
    let Some(session) = record.active_session_mut() else {
        return;
    };
    session.end(reason);
    let seq = session.seq;
    if reason != EndReason::Completed {
        record.schedulable_at = now;
    }
    project.record(
        Some(phase),
        AuditKind::SessionEnded,
        format!("session {} {}", seq, reason),
    );
}
