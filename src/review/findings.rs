//! Review findings types for quality gate inputs and outputs.
//!
//! ## Types
//!
//! - [`FindingSeverity`]: Severity classification for individual findings
//! - [`Verdict`]: Quality gate outcome (PASS / REVISE / BLOCKED)
//! - [`Finding`]: A single reviewer-reported issue
//! - [`QualityGateReview`]: One recorded review of a phase's deliverables
//!
//! ## Example
//!
//! ```
//! use phasegate::review::{Finding, FindingSeverity};
//!
//! let finding = Finding::new(
//!     FindingSeverity::Blocker,
//!     "src/auth/session.rs:42",
//!     "Session token is never rotated",
//! );
//! assert!(finding.is_blocker());
//! assert!(finding.fix_required());
//! assert!(finding.locally_fixable());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for individual review findings.
///
/// Severities are ordered from most to least critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Gates the phase until resolved.
    Blocker,
    /// Worth fixing, never gates.
    #[default]
    Warning,
    /// Optional improvement, never gates.
    Suggestion,
}

impl FindingSeverity {
    /// Check if this severity gates phase progression.
    ///
    /// # Examples
    ///
    /// ```
    /// use phasegate::review::FindingSeverity;
    ///
    /// assert!(FindingSeverity::Blocker.is_gating());
    /// assert!(!FindingSeverity::Warning.is_gating());
    /// ```
    pub fn is_gating(&self) -> bool {
        matches!(self, Self::Blocker)
    }

    /// Get the emoji indicator for this severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Blocker => "🔴",
            Self::Warning => "🟡",
            Self::Suggestion => "🔵",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocker => "blocker",
            Self::Warning => "warning",
            Self::Suggestion => "suggestion",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for FindingSeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocker" => Ok(Self::Blocker),
            "warning" => Ok(Self::Warning),
            "suggestion" => Ok(Self::Suggestion),
            _ => anyhow::bail!(
                "Invalid severity '{}'. Valid values: blocker, warning, suggestion",
                s
            ),
        }
    }
}

/// Quality gate verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// No unresolved blockers remain.
    #[default]
    Pass,
    /// At least one locally fixable blocker.
    Revise,
    /// At least one blocker that needs external action.
    Blocked,
}

impl Verdict {
    /// Get the emoji indicator for this verdict.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Revise => "↻",
            Self::Blocked => "✗",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "PASS",
            Self::Revise => "REVISE",
            Self::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

fn default_true() -> bool {
    true
}

/// A single finding from a reviewer.
///
/// Findings arrive without an id; the quality gate assigns one when the
/// finding is first recorded and the id is stable across carried-forward
/// reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Orchestrator-assigned identifier (empty until recorded).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    /// Severity of this finding.
    severity: FindingSeverity,
    /// Opaque location reference.
    #[serde(default)]
    location: String,
    /// Description of the issue.
    description: String,
    /// Whether a fix is required before re-review. Defaults to true for blockers.
    #[serde(default)]
    fix_required: Option<bool>,
    /// False when only external action (e.g. a missing decision) can resolve it.
    #[serde(default = "default_true")]
    locally_fixable: bool,
}

impl Finding {
    /// Create a new finding.
    pub fn new(
        severity: FindingSeverity,
        location: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            severity,
            location: location.into(),
            description: description.into(),
            fix_required: None,
            locally_fixable: true,
        }
    }

    /// Shorthand for a blocker that needs external action.
    ///
    /// # Examples
    ///
    /// ```
    /// use phasegate::review::Finding;
    ///
    /// let f = Finding::external_blocker("docs/adr", "Auth provider not chosen");
    /// assert!(f.is_blocker());
    /// assert!(!f.locally_fixable());
    /// ```
    pub fn external_blocker(location: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FindingSeverity::Blocker, location, description).not_locally_fixable()
    }

    /// Mark this finding as not resolvable without external action.
    pub fn not_locally_fixable(mut self) -> Self {
        self.locally_fixable = false;
        self
    }

    /// Override whether a fix is required before re-review.
    pub fn with_fix_required(mut self, required: bool) -> Self {
        self.fix_required = Some(required);
        self
    }

    pub(crate) fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn severity(&self) -> FindingSeverity {
        self.severity
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_blocker(&self) -> bool {
        self.severity.is_gating()
    }

    /// Whether a fix is required before re-review.
    pub fn fix_required(&self) -> bool {
        self.fix_required.unwrap_or(self.is_blocker())
    }

    pub fn locally_fixable(&self) -> bool {
        self.locally_fixable
    }

    /// Blockers and fix-required findings stay open until a review confirms them.
    pub fn carries_forward(&self) -> bool {
        self.is_blocker() || self.fix_required()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity.emoji(), self.severity)?;
        if !self.id.is_empty() {
            write!(f, " {}", self.id)?;
        }
        write!(f, " {}: {}", self.location, self.description)?;
        if !self.locally_fixable {
            write!(f, " (needs external action)")?;
        }
        Ok(())
    }
}

/// How a review came to be recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// A reviewer evaluated the deliverables.
    #[default]
    Review,
    /// A reviewer confirmed fixes for previously open findings.
    Reverify,
    /// An operator forced re-evaluation of the open findings.
    Revalidate,
}

/// One recorded quality gate review. Append-only once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateReview {
    /// Per-phase review sequence, starting at 1.
    pub sequence: u32,
    /// The review round (declare-complete count) this review targeted.
    pub round: u32,
    /// Opaque reviewer identity.
    pub reviewer: String,
    pub kind: ReviewKind,
    pub timestamp: DateTime<Utc>,
    /// Open findings the verdict was evaluated over (carried and new).
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// Finding ids this review confirmed resolved.
    #[serde(default)]
    pub confirmed_resolved: Vec<String>,
    pub verdict: Verdict,
}

impl QualityGateReview {
    /// Blocker findings still open on this review.
    pub fn open_blockers(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.is_blocker()).collect()
    }

    pub fn count_by_severity(&self, severity: FindingSeverity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

impl fmt::Display for QualityGateReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} review #{} by {} (round {}): {}",
            self.verdict.emoji(),
            self.sequence,
            self.reviewer,
            self.round,
            self.verdict
        )?;
        if !self.confirmed_resolved.is_empty() {
            writeln!(f, "  Confirmed resolved: {}", self.confirmed_resolved.join(", "))?;
        }
        for finding in &self.findings {
            writeln!(f, "    {}", finding)?;
        }
        Ok(())
    }
}
