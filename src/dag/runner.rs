//! Async runner for parallel phase execution.
//!
//! The runner drives a project to completion with a pool of agents. Each
//! assigned phase runs as its own tokio task; the orchestrator sits behind a
//! mutex and is only held for the duration of a single call. Agents and
//! reviewers are plugged in through the [`AgentDriver`] and [`Reviewer`]
//! traits.
//!
//! A failed phase task has its session aborted. Storage failures stop the
//! run: no new work is scheduled, running tasks drain, and `run` returns the
//! error.

use crate::checkpoint::CheckpointDraft;
use crate::errors::OrchestratorError;
use crate::lifecycle::PhaseState;
use crate::orchestrator::{OrchestratorService, SessionGrant};
use crate::review::{Finding, Verdict};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One step reported by an agent during a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// Progress with the session's current usage fraction
    Checkpoint { draft: CheckpointDraft, usage: f64 },
    /// Stop and leave the phase to another agent
    HandOff { draft: CheckpointDraft },
    /// Deliverables are done
    Complete {
        deliverables: Vec<String>,
        claimed_fixes: Vec<String>,
    },
}

/// Agent-invocation seam.
#[async_trait]
pub trait AgentDriver: Send + Sync {
    /// Run the agent until it has something to report for `grant`.
    async fn step(&self, grant: &SessionGrant) -> Result<SessionStep>;
}

/// What a reviewer is asked to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRequest {
    pub phase: String,
    pub round: u32,
    pub deliverables: Vec<String>,
    /// Findings still open from earlier rounds
    pub open_findings: Vec<Finding>,
    /// Fixes the agent claims, unverified
    pub claimed_fixes: Vec<String>,
}

/// A reviewer's answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewSubmission {
    pub reviewer: String,
    pub findings: Vec<Finding>,
    pub confirmed_resolved: Vec<String>,
}

/// Review seam.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewSubmission>;
}

/// Events emitted while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    SessionStarted {
        phase: String,
        agent: String,
        session: u32,
        resume: bool,
    },
    CheckpointRecorded {
        phase: String,
        session: u32,
        sequence: u32,
        usage: f64,
        forced: bool,
    },
    SessionYielded {
        phase: String,
        session: u32,
        reason: String,
    },
    ReviewCompleted {
        phase: String,
        round: u32,
        verdict: Verdict,
        findings: usize,
    },
    PhaseUnlocked {
        phase: String,
    },
    PhaseFailed {
        phase: String,
        error: String,
    },
    RunCompleted {
        summary: RunSummary,
    },
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: Vec<String>,
    pub blocked: Vec<String>,
    /// Neither passed nor blocked when the run stopped
    pub stuck: Vec<String>,
    /// Phases whose task ended in an error
    #[serde(default)]
    pub failed: Vec<String>,
    /// Sessions opened during the run
    pub sessions: u32,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.blocked.is_empty() && self.stuck.is_empty() && self.failed.is_empty()
    }
}

/// Runner limits.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub agents: Vec<String>,
    /// Steps one task may take before handing off
    pub max_steps: u32,
    /// Assignments per phase before the runner aborts it
    pub max_attempts: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            agents: vec!["agent-1".to_string()],
            max_steps: 50,
            max_attempts: 5,
        }
    }
}

impl RunnerConfig {
    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Report from one phase task.
#[derive(Debug)]
struct TaskReport {
    phase: String,
    agent: String,
    sessions: u32,
    error: Option<anyhow::Error>,
}

/// Everything a phase task needs.
#[derive(Clone)]
struct TaskContext {
    service: Arc<Mutex<OrchestratorService>>,
    driver: Arc<dyn AgentDriver>,
    reviewer: Arc<dyn Reviewer>,
    events: Option<mpsc::Sender<RunEvent>>,
    max_steps: u32,
}

impl TaskContext {
    async fn emit(&self, event: RunEvent) {
        emit(&self.events, event).await;
    }
}

async fn emit(events: &Option<mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        tx.send(event).await.ok();
    }
}

/// The runner.
pub struct Runner {
    config: RunnerConfig,
    driver: Arc<dyn AgentDriver>,
    reviewer: Arc<dyn Reviewer>,
    event_tx: Option<mpsc::Sender<RunEvent>>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        driver: Arc<dyn AgentDriver>,
        reviewer: Arc<dyn Reviewer>,
    ) -> Self {
        Self {
            config,
            driver,
            reviewer,
            event_tx: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Run until nothing more can be scheduled.
    pub async fn run(&self, service: Arc<Mutex<OrchestratorService>>) -> Result<RunSummary> {
        let max_parallel = service.lock().await.settings().scheduler.max_parallel.max(1);
        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let (result_tx, mut result_rx) = mpsc::channel::<TaskReport>(100);

        let ctx = TaskContext {
            service: service.clone(),
            driver: self.driver.clone(),
            reviewer: self.reviewer.clone(),
            events: self.event_tx.clone(),
            max_steps: self.config.max_steps,
        };

        let mut free: Vec<String> = self.config.agents.clone();
        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();
        let mut attempts: HashMap<String, u32> = HashMap::new();
        let mut sessions = 0u32;
        let mut failed: Vec<String> = Vec::new();
        let mut fatal: Option<anyhow::Error> = None;

        info!(
            agents = free.len(),
            max_parallel, "Starting run"
        );

        loop {
            if !free.is_empty() && fatal.is_none() {
                let grants = service
                    .lock()
                    .await
                    .schedule(&free)
                    .context("Failed to schedule phases")?;

                for grant in grants {
                    free.retain(|a| a != &grant.agent);
                    let tries = attempts.entry(grant.phase.clone()).or_insert(0);
                    *tries += 1;
                    if *tries > self.config.max_attempts {
                        warn!(
                            phase = %grant.phase,
                            attempts = self.config.max_attempts,
                            "Attempt limit reached, aborting phase"
                        );
                        service
                            .lock()
                            .await
                            .abort(&grant.phase)
                            .context("Failed to abort phase")?;
                        free.push(grant.agent);
                        continue;
                    }

                    sessions += 1;
                    ctx.emit(RunEvent::SessionStarted {
                        phase: grant.phase.clone(),
                        agent: grant.agent.clone(),
                        session: grant.session_seq,
                        resume: grant.is_resume(),
                    })
                    .await;

                    let permit = semaphore.clone().acquire_owned().await?;
                    let result_tx = result_tx.clone();
                    let ctx = ctx.clone();
                    let phase = grant.phase.clone();

                    let handle = tokio::spawn(async move {
                        let _permit = permit;
                        let report = drive_phase(&ctx, grant).await;
                        result_tx.send(report).await.ok();
                    });
                    active.insert(phase, handle);
                }
            }

            if active.is_empty() {
                break;
            }

            match result_rx.recv().await {
                Some(report) => {
                    if let Some(handle) = active.remove(&report.phase) {
                        handle.await.ok();
                    }
                    sessions += report.sessions;
                    if let Some(error) = report.error {
                        warn!(
                            phase = %report.phase,
                            agent = %report.agent,
                            "Phase task failed: {:#}",
                            error
                        );
                        failed.push(report.phase.clone());
                        if is_fatal(&error) && fatal.is_none() {
                            warn!("Storage failure, draining active tasks");
                            fatal = Some(error);
                        }
                    }
                    free.push(report.agent);
                    free.sort();
                }
                None => break,
            }
        }

        let summary = {
            let svc = service.lock().await;
            let mut summary = RunSummary {
                sessions,
                failed,
                ..RunSummary::default()
            };
            for record in &svc.project().phases {
                let id = record.id().to_string();
                match record.state {
                    PhaseState::Passed => summary.passed.push(id),
                    PhaseState::Blocked => summary.blocked.push(id),
                    _ => summary.stuck.push(id),
                }
            }
            summary
        };

        if let Some(error) = fatal {
            return Err(error.context("Run stopped after a storage failure"));
        }

        info!(
            passed = summary.passed.len(),
            blocked = summary.blocked.len(),
            stuck = summary.stuck.len(),
            failed = summary.failed.len(),
            sessions = summary.sessions,
            "Run completed"
        );
        emit(
            &self.event_tx,
            RunEvent::RunCompleted {
                summary: summary.clone(),
            },
        )
        .await;

        Ok(summary)
    }
}

/// Drive one assigned phase until its session ends.
async fn drive_phase(ctx: &TaskContext, grant: SessionGrant) -> TaskReport {
    let phase = grant.phase.clone();
    let agent = grant.agent.clone();
    let mut extra_sessions = 0;
    let error = drive_sessions(ctx, grant, &mut extra_sessions).await.err();
    if let Some(e) = &error {
        release_phase(ctx, &phase).await;
        ctx.emit(RunEvent::PhaseFailed {
            phase: phase.clone(),
            error: format!("{:#}", e),
        })
        .await;
    }
    TaskReport {
        phase,
        agent,
        sessions: extra_sessions,
        error,
    }
}

async fn drive_sessions(ctx: &TaskContext, mut grant: SessionGrant, extra: &mut u32) -> Result<()> {
    for _ in 0..ctx.max_steps {
        let step = ctx
            .driver
            .step(&grant)
            .await
            .with_context(|| format!("Agent failed on phase {}", grant.phase))?;

        match step {
            SessionStep::Checkpoint { draft, usage } => {
                let outcome = ctx.service.lock().await.record_checkpoint(
                    &grant.phase,
                    grant.session_seq,
                    draft,
                    usage,
                )?;
                ctx.emit(RunEvent::CheckpointRecorded {
                    phase: grant.phase.clone(),
                    session: grant.session_seq,
                    sequence: outcome.checkpoint.sequence,
                    usage,
                    forced: outcome.checkpoint.forced,
                })
                .await;

                if !outcome.yielded {
                    continue;
                }
                ctx.emit(RunEvent::SessionYielded {
                    phase: grant.phase.clone(),
                    session: grant.session_seq,
                    reason: "usage ceiling".to_string(),
                })
                .await;

                let Some(next) = outcome.next_session else {
                    return Ok(());
                };
                *extra += 1;
                grant.session_seq = next;
                grant.from = PhaseState::InProgress;
                grant.resume_point = Some(outcome.checkpoint);
                ctx.emit(RunEvent::SessionStarted {
                    phase: grant.phase.clone(),
                    agent: grant.agent.clone(),
                    session: next,
                    resume: true,
                })
                .await;
            }
            SessionStep::HandOff { draft } => {
                ctx.service
                    .lock()
                    .await
                    .hand_off(&grant.phase, grant.session_seq, draft)?;
                ctx.emit(RunEvent::SessionYielded {
                    phase: grant.phase.clone(),
                    session: grant.session_seq,
                    reason: "hand-off".to_string(),
                })
                .await;
                return Ok(());
            }
            SessionStep::Complete {
                deliverables,
                claimed_fixes,
            } => {
                let (round, open_findings) = {
                    let mut svc = ctx.service.lock().await;
                    let round = svc.declare_complete(
                        &grant.phase,
                        deliverables.clone(),
                        claimed_fixes.clone(),
                    )?;
                    (round, svc.phase(&grant.phase)?.open_findings.clone())
                };

                let request = ReviewRequest {
                    phase: grant.phase.clone(),
                    round,
                    deliverables,
                    open_findings,
                    claimed_fixes,
                };
                let submission = ctx.reviewer.review(&request).await?;

                let (review, unlocked) = {
                    let mut svc = ctx.service.lock().await;
                    let before = ready_ids(&svc);
                    let review = svc.submit_review(
                        &grant.phase,
                        &submission.reviewer,
                        submission.findings,
                        &submission.confirmed_resolved,
                        Some(round),
                    )?;
                    let unlocked: Vec<String> = ready_ids(&svc)
                        .into_iter()
                        .filter(|id| !before.contains(id))
                        .collect();
                    (review, unlocked)
                };

                ctx.emit(RunEvent::ReviewCompleted {
                    phase: grant.phase.clone(),
                    round,
                    verdict: review.verdict,
                    findings: review.findings.len(),
                })
                .await;
                for phase in unlocked {
                    debug!(phase = %phase, "Unlocked");
                    ctx.emit(RunEvent::PhaseUnlocked { phase }).await;
                }
                return Ok(());
            }
        }
    }

    warn!(phase = %grant.phase, steps = ctx.max_steps, "Step limit reached, handing off");
    ctx.service.lock().await.hand_off(
        &grant.phase,
        grant.session_seq,
        CheckpointDraft::with_next_action("continue after step limit"),
    )?;
    Ok(())
}

/// Abort a failed phase that still holds a session.
async fn release_phase(ctx: &TaskContext, phase: &str) {
    let mut svc = ctx.service.lock().await;
    let orphaned = svc
        .phase(phase)
        .is_ok_and(|p| p.has_active_session() || p.state == PhaseState::InProgress);
    if !orphaned {
        return;
    }
    match svc.abort(phase) {
        Ok(()) => info!(phase, "Aborted failed phase"),
        Err(e) => warn!(phase, "Failed to abort phase after task failure: {}", e),
    }
}

/// Storage faults end the run; everything else fails only its phase.
fn is_fatal(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<OrchestratorError>()
            .is_some_and(OrchestratorError::is_storage_error)
    })
}

fn ready_ids(service: &OrchestratorService) -> Vec<String> {
    service
        .project()
        .phases
        .iter()
        .filter(|p| p.state == PhaseState::Ready)
        .map(|p| p.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{Checkpoint, CheckpointBackend, CheckpointStore, RetryPolicy};
    use crate::errors::StorageError;
    use crate::orchestrator::{MemoryStateStore, OrchestratorSettings};
    use crate::phase::PhaseDef;
    use crate::review::FindingSeverity;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn diamond() -> Vec<PhaseDef> {
        vec![
            PhaseDef::new("a", "A", vec![]),
            PhaseDef::new("b", "B", vec!["a".into()]),
            PhaseDef::new("c", "C", vec!["a".into()]),
            PhaseDef::new("d", "D", vec!["b".into(), "c".into()]),
        ]
    }

    fn shared(defs: Vec<PhaseDef>) -> Arc<Mutex<OrchestratorService>> {
        Arc::new(Mutex::new(
            OrchestratorService::in_memory("run", defs).unwrap(),
        ))
    }

    fn agents(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("agent-{}", i)).collect()
    }

    /// Checkpoints once at `usage`, then completes. Keyed by (phase, session).
    struct ScriptedDriver {
        usage: f64,
        seen: StdMutex<HashSet<(String, u32)>>,
        running: StdMutex<HashSet<String>>,
        overlaps: StdMutex<Vec<(String, String)>>,
    }

    impl ScriptedDriver {
        fn new(usage: f64) -> Self {
            Self {
                usage,
                seen: StdMutex::new(HashSet::new()),
                running: StdMutex::new(HashSet::new()),
                overlaps: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentDriver for ScriptedDriver {
        async fn step(&self, grant: &SessionGrant) -> Result<SessionStep> {
            {
                let mut running = self.running.lock().unwrap();
                for other in running.iter() {
                    if other != &grant.phase {
                        self.overlaps
                            .lock()
                            .unwrap()
                            .push((other.clone(), grant.phase.clone()));
                    }
                }
                running.insert(grant.phase.clone());
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.running.lock().unwrap().remove(&grant.phase);

            let first = self
                .seen
                .lock()
                .unwrap()
                .insert((grant.phase.clone(), grant.session_seq));
            if first && grant.resume_point.is_none() {
                Ok(SessionStep::Checkpoint {
                    draft: CheckpointDraft::with_next_action("finish"),
                    usage: self.usage,
                })
            } else {
                Ok(SessionStep::Complete {
                    deliverables: vec![format!("{}.out", grant.phase)],
                    claimed_fixes: grant.open_findings.iter().map(|f| f.id().to_string()).collect(),
                })
            }
        }
    }

    struct Approver;

    #[async_trait]
    impl Reviewer for Approver {
        async fn review(&self, request: &ReviewRequest) -> Result<ReviewSubmission> {
            Ok(ReviewSubmission {
                reviewer: "lead".to_string(),
                findings: vec![],
                confirmed_resolved: request.claimed_fixes.clone(),
            })
        }
    }

    /// Raises one blocker on the first review of each phase.
    struct Strict {
        reviews: AtomicU32,
    }

    #[async_trait]
    impl Reviewer for Strict {
        async fn review(&self, request: &ReviewRequest) -> Result<ReviewSubmission> {
            let n = self.reviews.fetch_add(1, Ordering::SeqCst);
            let findings = if n == 0 {
                vec![Finding::new(FindingSeverity::Blocker, "src/", "missing tests")]
            } else {
                vec![]
            };
            Ok(ReviewSubmission {
                reviewer: "lead".to_string(),
                findings,
                confirmed_resolved: request.claimed_fixes.clone(),
            })
        }
    }

    struct Failing;

    #[async_trait]
    impl AgentDriver for Failing {
        async fn step(&self, _grant: &SessionGrant) -> Result<SessionStep> {
            anyhow::bail!("agent crashed")
        }
    }

    /// Backend whose appends always fail.
    struct BrokenDisk;

    impl CheckpointBackend for BrokenDisk {
        fn append(&mut self, _checkpoint: &Checkpoint) -> std::result::Result<(), StorageError> {
            Err(StorageError::Injected("disk unavailable".into()))
        }

        fn load_all(&self) -> std::result::Result<Vec<Checkpoint>, StorageError> {
            Ok(Vec::new())
        }
    }

    async fn collect(mut rx: mpsc::Receiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_diamond_runs_to_completion() {
        let service = shared(diamond());
        let driver = Arc::new(ScriptedDriver::new(0.4));
        let (tx, rx) = mpsc::channel(256);
        let runner = Runner::new(
            RunnerConfig::default().with_agents(agents(2)),
            driver.clone(),
            Arc::new(Approver),
        )
        .with_event_channel(tx);

        let summary = runner.run(service.clone()).await.unwrap();
        drop(runner);
        let events = collect(rx).await;

        assert!(summary.all_passed());
        assert_eq!(summary.passed.len(), 4);
        assert_eq!(summary.sessions, 4);
        assert!(matches!(events.last(), Some(RunEvent::RunCompleted { .. })));

        let unlocked: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::PhaseUnlocked { phase } => Some(phase.as_str()),
                _ => None,
            })
            .collect();
        assert!(unlocked.contains(&"b"));
        assert!(unlocked.contains(&"c"));
        assert!(unlocked.contains(&"d"));

        let svc = service.lock().await;
        for (x, y) in driver.overlaps.lock().unwrap().iter() {
            assert!(!svc.graph().related(x, y), "{} overlapped {}", x, y);
        }
    }

    #[tokio::test]
    async fn test_revise_loop_resumes_phase() {
        let service = shared(vec![PhaseDef::new("a", "A", vec![])]);
        let runner = Runner::new(
            RunnerConfig::default(),
            Arc::new(ScriptedDriver::new(0.1)),
            Arc::new(Strict {
                reviews: AtomicU32::new(0),
            }),
        );

        let summary = runner.run(service.clone()).await.unwrap();
        assert_eq!(summary.passed, vec!["a"]);
        assert_eq!(summary.sessions, 2);

        let svc = service.lock().await;
        let record = svc.phase("a").unwrap();
        assert_eq!(record.reviews.len(), 2);
        assert_eq!(record.reviews[0].verdict, Verdict::Revise);
        assert_eq!(record.reviews[1].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_forced_yield_continues_session() {
        let service = shared(vec![PhaseDef::new("a", "A", vec![])]);
        let (tx, rx) = mpsc::channel(64);
        let runner = Runner::new(
            RunnerConfig::default(),
            Arc::new(ScriptedDriver::new(0.9)),
            Arc::new(Approver),
        )
        .with_event_channel(tx);

        let summary = runner.run(service).await.unwrap();
        drop(runner);
        let events = collect(rx).await;

        assert!(summary.all_passed());
        assert_eq!(summary.sessions, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::SessionYielded { session: 1, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::CheckpointRecorded { forced: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_agent_failure_blocks_phase() {
        let service = shared(diamond());
        let runner = Runner::new(
            RunnerConfig::default().with_agents(agents(2)),
            Arc::new(Failing),
            Arc::new(Approver),
        );

        let summary = runner.run(service).await.unwrap();
        assert_eq!(summary.blocked, vec!["a"]);
        assert_eq!(summary.stuck, vec!["b", "c", "d"]);
        assert!(!summary.all_passed());
    }

    #[tokio::test]
    async fn test_checkpoint_failure_stops_run() {
        let checkpoints =
            CheckpointStore::open(Box::new(BrokenDisk), RetryPolicy::new(1, 0)).unwrap();
        let service = Arc::new(Mutex::new(
            OrchestratorService::define(
                "run",
                diamond(),
                Box::new(MemoryStateStore::new()),
                checkpoints,
                OrchestratorSettings::default(),
            )
            .unwrap(),
        ));
        let (tx, rx) = mpsc::channel(64);
        let runner = Runner::new(
            RunnerConfig::default().with_agents(agents(2)),
            Arc::new(ScriptedDriver::new(0.3)),
            Arc::new(Approver),
        )
        .with_event_channel(tx);

        let err = runner.run(service.clone()).await.unwrap_err();
        drop(runner);
        let events = collect(rx).await;

        assert!(err.chain().any(|cause| matches!(
            cause.downcast_ref::<OrchestratorError>(),
            Some(OrchestratorError::CheckpointWriteFailed { attempts: 2, .. })
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, RunEvent::PhaseFailed { phase, .. } if phase == "a")));
        assert!(!events
            .iter()
            .any(|e| matches!(e, RunEvent::RunCompleted { .. })));

        let svc = service.lock().await;
        let record = svc.phase("a").unwrap();
        assert_eq!(record.state, PhaseState::Blocked);
        assert!(!record.has_active_session());
        assert_eq!(svc.project().active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_is_reported_in_summary() {
        let service = shared(vec![PhaseDef::new("a", "A", vec![])]);
        let runner = Runner::new(RunnerConfig::default(), Arc::new(Failing), Arc::new(Approver));

        let summary = runner.run(service.clone()).await.unwrap();
        assert_eq!(summary.failed, vec!["a"]);
        assert!(!summary.all_passed());
        assert!(!service.lock().await.phase("a").unwrap().has_active_session());
    }

    #[tokio::test]
    async fn test_max_parallel_one_serializes() {
        let service = Arc::new(Mutex::new(
            OrchestratorService::in_memory("run", diamond())
                .unwrap()
                .with_settings(OrchestratorSettings::default().with_max_parallel(1)),
        ));
        let driver = Arc::new(ScriptedDriver::new(0.2));
        let runner = Runner::new(
            RunnerConfig::default().with_agents(agents(3)),
            driver.clone(),
            Arc::new(Approver),
        );
        let summary = runner.run(service).await.unwrap();
        assert!(summary.all_passed());
        assert!(driver.overlaps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_event_serialization() {
        let event = RunEvent::PhaseUnlocked { phase: "b".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"phase_unlocked","phase":"b"}"#);
    }
}
