//! Quality gate evaluation.
//!
//! [`evaluate`] is the verdict rule. [`apply_review`] and [`reverify`] fold a
//! new review into a phase's open findings: confirmed ids are resolved, every
//! other blocker or fix-required finding carries forward, and new findings get
//! orchestrator-assigned ids.

use super::findings::{Finding, Verdict};
use crate::errors::{OrchestratorError, Result};

/// Turn a set of findings into a verdict.
///
/// Rules are checked in order: any blocker that is not locally fixable gives
/// BLOCKED, any other blocker gives REVISE, anything else gives PASS.
///
/// # Examples
///
/// ```
/// use phasegate::review::{evaluate, Finding, FindingSeverity, Verdict};
///
/// let warning = Finding::new(FindingSeverity::Warning, "ui/", "Button misaligned");
/// assert_eq!(evaluate(&[warning.clone()]), Verdict::Pass);
///
/// let blocker = Finding::new(FindingSeverity::Blocker, "api/", "No input validation");
/// assert_eq!(evaluate(&[warning, blocker]), Verdict::Revise);
/// ```
pub fn evaluate(findings: &[Finding]) -> Verdict {
    if findings
        .iter()
        .any(|f| f.is_blocker() && !f.locally_fixable())
    {
        Verdict::Blocked
    } else if findings.iter().any(|f| f.is_blocker()) {
        Verdict::Revise
    } else {
        Verdict::Pass
    }
}

/// Result of folding one review into a phase's findings.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    /// Every finding the verdict was evaluated over (carried plus new).
    pub evaluated: Vec<Finding>,
    /// Findings that remain open for the next review.
    pub open: Vec<Finding>,
    /// Finding ids confirmed resolved by this review, deduplicated.
    pub resolved: Vec<String>,
    pub verdict: Verdict,
}

/// Assign the id for the `n`th new finding (1-based) of review `review_seq`.
pub fn finding_id(phase: &str, review_seq: u32, n: usize) -> String {
    format!("{}-R{}-F{}", phase, review_seq, n)
}

/// Fold a review into the currently open findings.
///
/// Every id in `confirmed_resolved` must name a currently open finding,
/// otherwise the whole review is rejected with `UnknownFinding`.
pub fn apply_review(
    phase: &str,
    review_seq: u32,
    open: &[Finding],
    confirmed_resolved: &[String],
    new_findings: Vec<Finding>,
) -> Result<GateOutcome> {
    let mut resolved: Vec<String> = Vec::new();
    for id in confirmed_resolved {
        if !open.iter().any(|f| f.id() == id) {
            return Err(OrchestratorError::UnknownFinding {
                phase: phase.to_string(),
                finding: id.clone(),
            });
        }
        if !resolved.contains(id) {
            resolved.push(id.clone());
        }
    }

    let mut evaluated: Vec<Finding> = open
        .iter()
        .filter(|f| !resolved.iter().any(|id| id == f.id()))
        .filter(|f| f.carries_forward())
        .cloned()
        .collect();

    evaluated.extend(
        new_findings
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.with_id(finding_id(phase, review_seq, i + 1))),
    );

    let verdict = evaluate(&evaluated);
    let open = evaluated
        .iter()
        .filter(|f| f.carries_forward())
        .cloned()
        .collect();

    Ok(GateOutcome {
        evaluated,
        open,
        resolved,
        verdict,
    })
}

/// Confirm fixes for open findings and re-evaluate the rest.
pub fn reverify(
    phase: &str,
    review_seq: u32,
    open: &[Finding],
    fixed: &[String],
) -> Result<GateOutcome> {
    apply_review(phase, review_seq, open, fixed, Vec::new())
}
