//! Quality gate reviews for phase progression.
//!
//! A reviewer submits findings against a phase's declared-complete
//! deliverables; the gate turns the open findings into a verdict.
//!
//! ## Components
//!
//! - [`findings`]: Finding, severity, verdict and recorded review types
//! - [`gate`]: Verdict rule, carry-forward and fix confirmation
//!
//! ## Example
//!
//! ```
//! use phasegate::review::{apply_review, Finding, FindingSeverity, Verdict};
//!
//! let raised = vec![Finding::new(FindingSeverity::Blocker, "api/", "Missing auth check")];
//! let first = apply_review("api", 1, &[], &[], raised).unwrap();
//! assert_eq!(first.verdict, Verdict::Revise);
//!
//! // Only a later review can confirm the fix.
//! let second = apply_review("api", 2, &first.open, &["api-R1-F1".to_string()], vec![]).unwrap();
//! assert_eq!(second.verdict, Verdict::Pass);
//! ```

pub mod findings;
pub mod gate;

pub use findings::{Finding, FindingSeverity, QualityGateReview, ReviewKind, Verdict};
pub use gate::{GateOutcome, apply_review, evaluate, finding_id, reverify};
