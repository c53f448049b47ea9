use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use phasegate::config::Config;
use phasegate::errors::{EXIT_VALIDATION, OrchestratorError};
use phasegate::{logging, ui};

mod cmd;

#[derive(Parser)]
#[command(name = "phasegate")]
#[command(version, about = "Phase-gated build orchestrator")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Maximum active sessions. Overrides phasegate.toml and PHASEGATE_MAX_PARALLEL.
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,

    /// Usage fraction that forces a session to yield.
    /// Overrides phasegate.toml and PHASEGATE_USAGE_CEILING.
    #[arg(long, global = true)]
    pub usage_ceiling: Option<f64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .phasegate directory
    Init,
    /// Validate a phases file and create the project
    Define {
        phases_file: PathBuf,
        /// Project name (defaults to the file's project field, then the directory name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Add a phase to the defined project
    AddPhase {
        id: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        #[arg(long = "exclusive")]
        exclusive_tags: Vec<String>,
    },
    /// Make TARGET depend on SOURCE
    AddDependency { source: String, target: String },
    /// Print phase states and readiness
    Status {
        /// Show one phase in detail
        phase: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print execution waves for the outstanding work
    Plan,
    /// Assign the next ready phase to an agent
    Assign {
        #[arg(long)]
        agent: String,
    },
    /// Record a checkpoint for the active session
    Checkpoint {
        phase: String,
        #[arg(long)]
        session: u32,
        #[arg(long)]
        usage: f64,
        /// Checkpoint draft as JSON
        #[arg(long)]
        file: Option<PathBuf>,
        /// Next action for whoever resumes
        #[arg(long)]
        next: Option<String>,
    },
    /// End the active session with a final checkpoint
    Handoff {
        phase: String,
        #[arg(long)]
        session: u32,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        next: Option<String>,
    },
    /// Declare the phase complete and start a review round
    Complete {
        phase: String,
        #[arg(long = "deliverable")]
        deliverables: Vec<String>,
        /// Finding ids the agent claims to have fixed
        #[arg(long = "claims-fixed")]
        claims_fixed: Vec<String>,
    },
    /// Submit a review for the current round
    Review {
        phase: String,
        #[arg(long)]
        reviewer: String,
        /// JSON array of findings
        #[arg(long)]
        findings: Option<PathBuf>,
        /// Open finding ids confirmed resolved
        #[arg(long)]
        resolved: Vec<String>,
        /// Review round this submission targets
        #[arg(long)]
        round: Option<u32>,
    },
    /// Confirm fixes for open findings
    Reverify {
        phase: String,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        fixed: Vec<String>,
    },
    /// Force-revalidate an UNDER_REVIEW phase
    Advance { phase: String },
    /// Return a BLOCKED phase to READY
    Reopen { phase: String },
    /// Force a READY or IN_PROGRESS phase to BLOCKED
    Abort { phase: String },
    /// Print the checkpoint history of a phase
    History {
        phase: String,
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any problems
    Validate,
    /// Initialize a default phasegate.toml file
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", ui::render_error(&format!("{:#}", e)));
            let code = e
                .downcast_ref::<OrchestratorError>()
                .map(OrchestratorError::exit_code)
                .unwrap_or(EXIT_VALIDATION);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::new(project_dir, cli.verbose, cli.max_parallel, cli.usage_ceiling)?;
    // `config` subcommands report problems themselves
    if !matches!(cli.command, Commands::Config { .. }) {
        config.ensure_valid()?;
    }

    let log_dir = config.is_initialized().then(|| config.log_dir.clone());
    let _log_guard = logging::init(
        &config.phasegate_config().toml.logging,
        cli.verbose,
        log_dir.as_deref(),
    )?;

    match cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Define { phases_file, name } => {
            cmd::cmd_define(&config, &phases_file, name.as_deref())?
        }
        Commands::AddPhase {
            id,
            label,
            depends_on,
            exclusive_tags,
        } => cmd::cmd_add_phase(&config, &id, label.as_deref(), depends_on, exclusive_tags)?,
        Commands::AddDependency { source, target } => {
            cmd::cmd_add_dependency(&config, &source, &target)?
        }
        Commands::Status { phase, json } => cmd::cmd_status(&config, phase.as_deref(), json)?,
        Commands::Plan => cmd::cmd_plan(&config)?,
        Commands::Assign { agent } => cmd::cmd_assign(&config, &agent)?,
        Commands::Checkpoint {
            phase,
            session,
            usage,
            file,
            next,
        } => cmd::cmd_checkpoint(
            &config,
            &phase,
            session,
            usage,
            file.as_deref(),
            next.as_deref(),
        )?,
        Commands::Handoff {
            phase,
            session,
            file,
            next,
        } => cmd::cmd_handoff(&config, &phase, session, file.as_deref(), next.as_deref())?,
        Commands::Complete {
            phase,
            deliverables,
            claims_fixed,
        } => cmd::cmd_complete(&config, &phase, deliverables, claims_fixed)?,
        Commands::Review {
            phase,
            reviewer,
            findings,
            resolved,
            round,
        } => cmd::cmd_review(
            &config,
            &phase,
            &reviewer,
            findings.as_deref(),
            &resolved,
            round,
        )?,
        Commands::Reverify {
            phase,
            reviewer,
            fixed,
        } => cmd::cmd_reverify(&config, &phase, &reviewer, &fixed)?,
        Commands::Advance { phase } => cmd::cmd_advance(&config, &phase)?,
        Commands::Reopen { phase } => cmd::cmd_reopen(&config, &phase)?,
        Commands::Abort { phase } => cmd::cmd_abort(&config, &phase)?,
        Commands::History { phase, json } => cmd::cmd_history(&config, &phase, json)?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
