use anyhow::{Context, Result, anyhow};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use crate::checkpoint::{CheckpointStore, JsonlBackend};
use crate::orchestrator::{FileStateStore, OrchestratorService, OrchestratorSettings, ProjectLock};
use crate::phase::PhaseDef;
use crate::phasegate_config::PhasegateConfig;

/// Runtime configuration for phasegate.
///
/// Bridges the layered `PhasegateConfig` with the on-disk layout the
/// commands need, and wires the file-backed stores into an orchestrator.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub project_file: PathBuf,
    pub checkpoints_file: PathBuf,
    pub lock_file: PathBuf,
    pub log_dir: PathBuf,
    pub verbose: bool,
    /// The underlying layered configuration
    phasegate_config: PhasegateConfig,
}

impl Config {
    /// Resolve the project directory and load its configuration.
    pub fn new(
        project_dir: PathBuf,
        verbose: bool,
        max_parallel: Option<usize>,
        usage_ceiling: Option<f64>,
    ) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let phasegate_config =
            PhasegateConfig::new(&project_dir)?.with_cli_args(max_parallel, usage_ceiling);

        Ok(Self {
            state_dir: phasegate_config.state_dir.clone(),
            project_file: phasegate_config.project_file(),
            checkpoints_file: phasegate_config.checkpoints_file(),
            lock_file: phasegate_config.lock_file(),
            log_dir: phasegate_config.log_dir(),
            project_dir,
            verbose,
            phasegate_config,
        })
    }

    pub fn phasegate_config(&self) -> &PhasegateConfig {
        &self.phasegate_config
    }

    /// Fail on any problem in the effective configuration.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.phasegate_config.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(anyhow!(
            "Invalid configuration: {}. Run 'phasegate config validate' for details.",
            problems.join("; ")
        ))
    }

    pub fn is_initialized(&self) -> bool {
        self.state_dir.exists()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("Failed to create .phasegate directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings::from_config(&self.phasegate_config)
    }

    fn checkpoint_store(&self) -> Result<CheckpointStore> {
        CheckpointStore::open(
            Box::new(JsonlBackend::new(&self.checkpoints_file)),
            self.phasegate_config.retry_policy(),
        )
        .context("Failed to open checkpoint log")
    }

    /// Create a new project from validated phase definitions.
    ///
    /// Refuses to overwrite an existing project.
    pub fn define_project(
        &self,
        name: Option<&str>,
        defs: Vec<PhaseDef>,
    ) -> Result<LockedProject> {
        let lock = self.lock()?;
        if self.project_file.exists() {
            return Err(anyhow!(
                "A project is already defined at {}",
                self.project_file.display()
            ));
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| self.phasegate_config.project_name());
        let service = OrchestratorService::define(
            &name,
            defs,
            Box::new(FileStateStore::new(&self.project_file)),
            self.checkpoint_store()?,
            self.settings(),
        )?;
        Ok(LockedProject {
            service,
            _lock: lock,
        })
    }

    /// Open the saved project.
    ///
    /// Blocks until no other process holds the project. The project and the
    /// checkpoint log are loaded under the lock, so every command sees the
    /// latest committed state.
    pub fn open_project(&self) -> Result<LockedProject> {
        let no_project =
            || anyhow!("No project defined. Run 'phasegate define <phases.json>' first.");
        if !self.project_file.exists() {
            return Err(no_project());
        }
        let lock = self.lock()?;
        let service = OrchestratorService::open(
            Box::new(FileStateStore::new(&self.project_file)),
            self.checkpoint_store()?,
            self.settings(),
        )?
        .ok_or_else(no_project)?;
        Ok(LockedProject {
            service,
            _lock: lock,
        })
    }

    fn lock(&self) -> Result<ProjectLock> {
        ProjectLock::acquire(&self.lock_file).context("Failed to lock project")
    }
}

/// An orchestrator that holds the project lock until dropped.
#[derive(Debug)]
pub struct LockedProject {
    service: OrchestratorService,
    _lock: ProjectLock,
}

impl Deref for LockedProject {
    type Target = OrchestratorService;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

impl DerefMut for LockedProject {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.service
    }
}
