//! Configuration view and validation commands (`phasegate config`).

use anyhow::Result;

use phasegate::config::Config;
use phasegate::phasegate_config::{ENV_MAX_PARALLEL, ENV_USAGE_CEILING, PhasegateToml};

use super::super::ConfigCommands;

fn print_toml(toml: &PhasegateToml) {
    if let Some(name) = &toml.project.name {
        println!("[project]");
        println!("  name = \"{}\"", name);
        println!();
    }
    println!("[sessions]");
    println!("  usage_ceiling = {}", toml.sessions.usage_ceiling);
    println!("  auto_continue = {}", toml.sessions.auto_continue);
    println!();
    println!("[scheduling]");
    println!("  max_parallel = {}", toml.scheduling.max_parallel);
    println!();
    println!("[checkpoints]");
    println!("  max_retries = {}", toml.checkpoints.max_retries);
    println!("  retry_backoff_ms = {}", toml.checkpoints.retry_backoff_ms);
    println!();
    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  format = \"{}\"", toml.logging.format);
    println!("  file = {}", toml.logging.file);
    println!();
}

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let layered = config.phasegate_config();
    let config_path = layered.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("phasegate Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No phasegate.toml found at {}", config_path.display());
                println!("Using default configuration:");
            }
            println!();
            print_toml(&layered.toml);

            println!(
                "Effective values (with {}/{} and CLI overrides):",
                ENV_USAGE_CEILING, ENV_MAX_PARALLEL
            );
            println!("  project = \"{}\"", layered.project_name());
            println!("  usage_ceiling = {}", layered.usage_ceiling());
            println!("  max_parallel = {}", layered.max_parallel());
            println!();
            if !config_path.exists() {
                println!("Run 'phasegate config init' to create a phasegate.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No phasegate.toml found. Using defaults (valid).");
            }

            let problems = layered.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration problems:");
                for problem in &problems {
                    println!("  - {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("phasegate.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            config.ensure_directories()?;
            PhasegateToml::default().save(&config_path)?;

            println!("Created phasegate.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [sessions] usage_ceiling, auto_continue");
            println!("  - [scheduling] max_parallel");
            println!("  - [checkpoints] max_retries, retry_backoff_ms");
            println!("  - [logging] level, format, file");
            println!();
        }
    }

    Ok(())
}
