//! Review submission and operator commands.

use anyhow::{Context, Result};
use std::path::Path;

use phasegate::config::Config;
use phasegate::review::Finding;
use phasegate::ui;
use phasegate::ui::icons::{BLOCKER, CHECK};

/// Read a JSON array of findings. A missing file means no findings.
fn load_findings(file: Option<&Path>) -> Result<Vec<Finding>> {
    let Some(path) = file else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read findings file: {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse findings JSON")
}

pub fn cmd_review(
    config: &Config,
    phase: &str,
    reviewer: &str,
    findings: Option<&Path>,
    resolved: &[String],
    round: Option<u32>,
) -> Result<()> {
    let findings = load_findings(findings)?;
    let mut service = config.open_project()?;
    let review = service.submit_review(phase, reviewer, findings, resolved, round)?;
    print!("{}", ui::render_review(&review));
    println!("Phase {} is now {}", phase, service.phase(phase)?.state);
    Ok(())
}

pub fn cmd_reverify(config: &Config, phase: &str, reviewer: &str, fixed: &[String]) -> Result<()> {
    let mut service = config.open_project()?;
    let review = service.reverify(phase, reviewer, fixed)?;
    print!("{}", ui::render_review(&review));
    println!("Phase {} is now {}", phase, service.phase(phase)?.state);
    Ok(())
}

pub fn cmd_advance(config: &Config, phase: &str) -> Result<()> {
    let mut service = config.open_project()?;
    let review = service.advance(phase)?;
    print!("{}", ui::render_review(&review));
    println!("Phase {} is now {}", phase, service.phase(phase)?.state);
    Ok(())
}

pub fn cmd_reopen(config: &Config, phase: &str) -> Result<()> {
    let mut service = config.open_project()?;
    service.reopen(phase)?;
    println!("{}Phase {} reopened and READY", CHECK, phase);
    Ok(())
}

pub fn cmd_abort(config: &Config, phase: &str) -> Result<()> {
    let mut service = config.open_project()?;
    service.abort(phase)?;
    println!("{}Phase {} aborted and BLOCKED", BLOCKER, phase);
    Ok(())
}
