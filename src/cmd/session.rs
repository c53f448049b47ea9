//! Agent-facing session commands.

use anyhow::{Context, Result};
use std::path::Path;

use phasegate::checkpoint::CheckpointDraft;
use phasegate::config::Config;
use phasegate::ui;
use phasegate::ui::icons::{CHECK, REVIEW};

fn load_draft(file: Option<&Path>, next: Option<&str>) -> Result<CheckpointDraft> {
    let mut draft = match file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read checkpoint file: {}", path.display()))?;
            serde_json::from_str(&content).context("Failed to parse checkpoint JSON")?
        }
        None => CheckpointDraft::default(),
    };
    if let Some(next) = next {
        draft.resume.next_action = next.to_string();
    }
    Ok(draft)
}

pub fn cmd_assign(config: &Config, agent: &str) -> Result<()> {
    let mut service = config.open_project()?;
    match service.assign_next_ready_phase(agent)? {
        Some(grant) => print!("{}", ui::render_grant(&grant)),
        None => println!("No phase available for {}.", agent),
    }
    Ok(())
}

pub fn cmd_checkpoint(
    config: &Config,
    phase: &str,
    session: u32,
    usage: f64,
    file: Option<&Path>,
    next: Option<&str>,
) -> Result<()> {
    let draft = load_draft(file, next)?;
    let mut service = config.open_project()?;
    let outcome = service.record_checkpoint(phase, session, draft, usage)?;
    print!("{}", ui::render_checkpoint(&outcome));
    Ok(())
}

pub fn cmd_handoff(
    config: &Config,
    phase: &str,
    session: u32,
    file: Option<&Path>,
    next: Option<&str>,
) -> Result<()> {
    let draft = load_draft(file, next)?;
    let mut service = config.open_project()?;
    let checkpoint = service.hand_off(phase, session, draft)?;
    println!(
        "{}Session {} of phase {} handed off at checkpoint #{}",
        CHECK, session, phase, checkpoint.sequence
    );
    Ok(())
}

pub fn cmd_complete(
    config: &Config,
    phase: &str,
    deliverables: Vec<String>,
    claims_fixed: Vec<String>,
) -> Result<()> {
    let mut service = config.open_project()?;
    let round = service.declare_complete(phase, deliverables, claims_fixed)?;
    println!("{}Phase {} is under review (round {})", REVIEW, phase, round);
    Ok(())
}
