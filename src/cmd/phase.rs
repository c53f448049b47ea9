//! Status, plan and history commands.

use anyhow::Result;

use phasegate::config::Config;
use phasegate::ui;

pub fn cmd_status(config: &Config, phase: Option<&str>, json: bool) -> Result<()> {
    let service = config.open_project()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&service.status_summary())?);
        return Ok(());
    }

    let Some(id) = phase else {
        print!("{}", ui::render_status(&service.status_summary()));
        return Ok(());
    };

    let record = service.phase(id)?;
    println!();
    println!(
        "{}{} {}",
        ui::state_icon(record.state),
        console::style(record.def.display_name()).bold(),
        ui::styled_state(record.state)
    );
    if !record.def.depends_on.is_empty() {
        println!("Depends on: {}", record.def.depends_on.join(", "));
    }
    println!(
        "Sessions: {}  Review round: {}  Reviews: {}",
        record.sessions.len(),
        record.review_round,
        record.reviews.len()
    );
    if let Some(session) = record.active_session() {
        println!(
            "Active session {} ({}) usage {:.2}",
            session.seq, session.agent, session.usage
        );
    }
    if !record.deliverables.is_empty() {
        println!("Deliverables: {}", record.deliverables.join(", "));
    }
    if !record.open_findings.is_empty() {
        println!("Open findings:");
        for finding in &record.open_findings {
            println!("  {}", finding);
        }
    }
    if let Some(review) = record.latest_review() {
        println!();
        print!("{}", ui::render_review(review));
    }
    println!();
    println!("Log:");
    print!("{}", ui::render_log(&service.project().phase_log(id)));
    Ok(())
}

pub fn cmd_plan(config: &Config) -> Result<()> {
    let service = config.open_project()?;
    print!("{}", ui::render_waves(&service.waves()));
    Ok(())
}

pub fn cmd_history(config: &Config, phase: &str, json: bool) -> Result<()> {
    let service = config.open_project()?;
    let history = service.history(phase)?;
    if json {
        println!("{}", serde_json::to_string_pretty(history)?);
    } else {
        print!("{}", ui::render_history(phase, history));
    }
    Ok(())
}
