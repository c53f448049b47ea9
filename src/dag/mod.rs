//! Dependency graph, readiness and parallel scheduling.
//!
//! ## Architecture
//!
//! 1. **Builder** - validates phase definitions into a `PhaseGraph`
//!    (duplicates, unknown references, cycles) and precomputes ancestors
//! 2. **Resolver** - readiness, coordinator candidates and execution waves
//! 3. **Scheduler** - the coordinator that hands candidates to agents
//! 4. **Runner** - async driver that runs assigned phases as tokio tasks
//!
//! ## Example
//!
//! ```
//! use phasegate::dag::{DagBuilder, compute_waves};
//! use phasegate::phase::PhaseDef;
//!
//! # fn example() -> phasegate::errors::Result<()> {
//! let phases = vec![
//!     PhaseDef::new("01", "Setup", vec![]),
//!     PhaseDef::new("02", "Core", vec!["01".to_string()]),
//!     PhaseDef::new("03", "Tests", vec!["01".to_string()]),
//!     PhaseDef::new("04", "Docs", vec!["02".to_string(), "03".to_string()]),
//! ];
//!
//! let graph = DagBuilder::new(phases).build()?;
//! let waves = compute_waves(&graph);
//! // Wave 0: [01] - no dependencies
//! // Wave 1: [02, 03] - both depend only on 01
//! // Wave 2: [04] - depends on 02 and 03
//! assert_eq!(waves.len(), 3);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod builder;
pub mod resolver;
pub mod runner;
pub mod scheduler;

pub use builder::{DagBuilder, PhaseGraph, PhaseIndex};
pub use resolver::{ReadyPhase, candidates, compute_waves, readiness, remaining_waves};
pub use runner::{
    AgentDriver, ReviewRequest, ReviewSubmission, Reviewer, RunEvent, RunSummary, Runner,
    RunnerConfig, SessionStep,
};
pub use scheduler::{Assignment, Coordinator, SchedulerConfig, conflicts};
