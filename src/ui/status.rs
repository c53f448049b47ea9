//! Text rendering for status, plan, history and review output.
//!
//! Renderers return strings; commands decide where they go.

use console::{StyledObject, style};
use std::fmt::Write;

use crate::checkpoint::Checkpoint;
use crate::lifecycle::PhaseState;
use crate::orchestrator::{CheckpointOutcome, SessionGrant, StatusSummary};
use crate::project::AuditEntry;
use crate::review::{QualityGateReview, Verdict};
use crate::ui::icons::{
    BLOCKER, CHECK, CHECKPOINT, CLOCK, CROSS, PENDING, PIVOT, PROGRESS, READY, REVIEW, RUNNING,
    SPARKLE, WAVE,
};

/// Icon for a phase state.
pub fn state_icon(state: PhaseState) -> String {
    match state {
        PhaseState::Pending => PENDING.to_string(),
        PhaseState::Ready => READY.to_string(),
        PhaseState::InProgress => RUNNING.to_string(),
        PhaseState::UnderReview => REVIEW.to_string(),
        PhaseState::Passed => CHECK.to_string(),
        PhaseState::ReviseRequired => PIVOT.to_string(),
        PhaseState::Blocked => BLOCKER.to_string(),
    }
}

/// Colored state label.
pub fn styled_state(state: PhaseState) -> StyledObject<String> {
    let label = style(state.to_string());
    match state {
        PhaseState::Passed => label.green(),
        PhaseState::Ready => label.cyan(),
        PhaseState::InProgress | PhaseState::UnderReview => label.yellow(),
        PhaseState::ReviseRequired => label.magenta(),
        PhaseState::Blocked => label.red().bold(),
        PhaseState::Pending => label.dim(),
    }
}

fn styled_verdict(verdict: Verdict) -> StyledObject<String> {
    let label = style(verdict.to_string());
    match verdict {
        Verdict::Pass => label.green().bold(),
        Verdict::Revise => label.yellow().bold(),
        Verdict::Blocked => label.red().bold(),
    }
}

pub fn render_status(summary: &StatusSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}Project: {}", PROGRESS, style(&summary.project).bold());
    let _ = writeln!(
        out,
        "{}/{} phases passed ({:.0}%)",
        summary.passed, summary.total, summary.percent_complete
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<16} {:<16} {:<9} {:<7} {:<10} Findings",
        "Phase", "State", "Sessions", "Round", "Verdict"
    );
    let _ = writeln!(
        out,
        "{:<16} {:<16} {:<9} {:<7} {:<10} --------",
        "----------------", "----------------", "--------", "-----", "-------"
    );

    for phase in &summary.phases {
        let verdict = phase
            .last_verdict
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        let findings = if phase.open_findings == 0 {
            "-".to_string()
        } else {
            format!("{} open ({} blocker)", phase.open_findings, phase.open_blockers)
        };
        let _ = writeln!(
            out,
            "{:<16} {}{:<16} {:<9} {:<7} {:<10} {}",
            phase.id,
            state_icon(phase.state),
            styled_state(phase.state),
            phase.sessions,
            phase.review_round,
            verdict,
            findings
        );
        if let Some((seq, agent)) = &phase.active {
            let _ = writeln!(
                out,
                "  {}",
                style(format!("session {} active ({})", seq, agent)).dim()
            );
        }
    }

    let _ = writeln!(out);
    let counts: Vec<String> = summary
        .counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(state, n)| format!("{} {}", n, state))
        .collect();
    let _ = writeln!(out, "{}", counts.join(", "));
    if summary.schedulable.is_empty() {
        let _ = writeln!(out, "Nothing schedulable.");
    } else {
        let _ = writeln!(out, "Schedulable: {}", summary.schedulable.join(", "));
    }
    out
}

pub fn render_waves(waves: &[Vec<String>]) -> String {
    let mut out = String::new();
    if waves.is_empty() {
        let _ = writeln!(out, "{}All phases passed.", SPARKLE);
        return out;
    }
    let _ = writeln!(out, "Execution plan: {} wave(s)", waves.len());
    for (i, wave) in waves.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}Wave {}: {}",
            WAVE,
            style(i).yellow().bold(),
            wave.join(", ")
        );
    }
    out
}

pub fn render_history(phase: &str, history: &[Checkpoint]) -> String {
    let mut out = String::new();
    if history.is_empty() {
        let _ = writeln!(out, "No checkpoints for phase {}.", phase);
        return out;
    }
    let _ = writeln!(out, "Checkpoints for phase {}:", style(phase).bold());
    for cp in history {
        let forced = if cp.forced {
            style(" forced").red().to_string()
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "{}#{} session {} usage {:.2}{} at {}",
            CHECKPOINT,
            cp.sequence,
            cp.session_seq,
            cp.usage,
            forced,
            cp.written_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !cp.draft.completed_items.is_empty() {
            let _ = writeln!(out, "    done: {}", cp.draft.completed_items.join("; "));
        }
        if !cp.draft.in_progress.is_empty() {
            let _ = writeln!(out, "    in progress: {}", cp.draft.in_progress);
        }
        for decision in &cp.draft.decisions {
            let _ = writeln!(out, "    decision {}: {}", decision.key, decision.rationale);
        }
        for blocker in &cp.draft.blockers {
            let _ = writeln!(out, "    {}{}", BLOCKER, blocker);
        }
        if !cp.next_action().is_empty() {
            let _ = writeln!(out, "    next: {}", cp.next_action());
        }
    }
    out
}

pub fn render_review(review: &QualityGateReview) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} (review {}, round {}, by {})",
        review.verdict.emoji(),
        styled_verdict(review.verdict),
        review.sequence,
        review.round,
        review.reviewer
    );
    if !review.confirmed_resolved.is_empty() {
        let _ = writeln!(out, "Resolved: {}", review.confirmed_resolved.join(", "));
    }
    for finding in &review.findings {
        let _ = writeln!(out, "  {}", finding);
    }
    out
}

pub fn render_grant(grant: &SessionGrant) -> String {
    let mut out = String::new();
    let verb = if grant.is_resume() { "Resumed" } else { "Assigned" };
    let _ = writeln!(
        out,
        "{}{} phase {} to {} (session {})",
        RUNNING,
        verb,
        style(&grant.phase).bold(),
        grant.agent,
        grant.session_seq
    );
    if let Some(cp) = &grant.resume_point {
        let _ = writeln!(out, "  resume from checkpoint #{}: {}", cp.sequence, cp.next_action());
    }
    for finding in &grant.open_findings {
        let _ = writeln!(out, "  fix: {}", finding);
    }
    out
}

pub fn render_checkpoint(outcome: &CheckpointOutcome) -> String {
    let mut out = String::new();
    let cp = &outcome.checkpoint;
    let _ = writeln!(
        out,
        "{}Checkpoint #{} recorded for phase {} (session {}, usage {:.2})",
        CHECKPOINT, cp.sequence, cp.phase, cp.session_seq, cp.usage
    );
    if outcome.yielded {
        let _ = writeln!(out, "{}Usage ceiling reached, session yielded", CLOCK);
        if let Some(next) = outcome.next_session {
            let _ = writeln!(out, "  continuing in session {}", next);
        }
    }
    out
}

pub fn render_log(entries: &[&AuditEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "  [{:>4}] {:<16} {}",
            entry.at,
            entry.kind.to_string(),
            style(&entry.detail).dim()
        );
    }
    out
}

/// One-line error for stderr.
pub fn render_error(message: &str) -> String {
    format!("{}{}", CROSS, style(message).red())
}
