//! Project initialization and definition commands.

use anyhow::Result;
use std::path::Path;

use phasegate::config::Config;
use phasegate::phase::{PhaseDef, PhasesFile};
use phasegate::phasegate_config::PhasegateToml;
use phasegate::ui::icons::CHECK;

pub fn cmd_init(config: &Config) -> Result<()> {
    let was_initialized = config.is_initialized();
    config.ensure_directories()?;

    let config_path = config.phasegate_config().config_file();
    if !config_path.exists() {
        PhasegateToml::default().save(&config_path)?;
    }

    if was_initialized {
        println!(
            "phasegate project already initialized at {}",
            config.state_dir.display()
        );
        println!("Directory structure verified.");
        return Ok(());
    }

    println!(
        "{}Initialized phasegate project at {}",
        CHECK,
        config.state_dir.display()
    );
    println!();
    println!("Created directory structure:");
    println!("  .phasegate/");
    println!("  ├── phasegate.toml      # Configuration (use `phasegate config`)");
    println!("  ├── project.json        # Project state (use `phasegate define`)");
    println!("  ├── checkpoints.jsonl   # Session checkpoints");
    println!("  └── logs/               # Rolling log files");
    println!();
    println!("Next steps:");
    println!("  1. Write a phases.json with your phases and dependencies");
    println!("  2. Run `phasegate define phases.json`");
    println!("  3. Run `phasegate assign --agent <id>` to hand out work");
    Ok(())
}

pub fn cmd_define(config: &Config, phases_file: &Path, name: Option<&str>) -> Result<()> {
    let pf = PhasesFile::load(phases_file)?;
    config.ensure_directories()?;

    let name = name.or(pf.project.as_deref());
    let service = config.define_project(name, pf.phases)?;

    let summary = service.status_summary();
    println!(
        "{}Defined project {} with {} phases",
        CHECK, summary.project, summary.total
    );
    println!("Ready: {}", summary.schedulable.join(", "));
    Ok(())
}

pub fn cmd_add_phase(
    config: &Config,
    id: &str,
    label: Option<&str>,
    depends_on: Vec<String>,
    exclusive_tags: Vec<String>,
) -> Result<()> {
    let mut service = config.open_project()?;
    let def =
        PhaseDef::new(id, label.unwrap_or(id), depends_on).with_exclusive_tags(exclusive_tags);
    service.add_phase(def)?;
    let state = service.phase(id)?.state;
    println!("{}Added phase {} ({})", CHECK, id, state);
    Ok(())
}

pub fn cmd_add_dependency(config: &Config, source: &str, target: &str) -> Result<()> {
    let mut service = config.open_project()?;
    service.add_dependency(source, target)?;
    println!("{}Phase {} now depends on {}", CHECK, target, source);
    Ok(())
}
