//! Unified configuration for phasegate.
//!
//! Reads `.phasegate/phasegate.toml`. Layers apply in order: file, then
//! environment, then CLI flags. Missing fields take their defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! name = "storefront"
//!
//! [sessions]
//! usage_ceiling = 0.8
//! auto_continue = true
//!
//! [scheduling]
//! max_parallel = 4
//!
//! [checkpoints]
//! max_retries = 3
//! retry_backoff_ms = 50
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! file = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::checkpoint::RetryPolicy;
use crate::dag::SchedulerConfig;

/// Environment override for `sessions.usage_ceiling`.
pub const ENV_USAGE_CEILING: &str = "PHASEGATE_USAGE_CEILING";
/// Environment override for `scheduling.max_parallel`.
pub const ENV_MAX_PARALLEL: &str = "PHASEGATE_MAX_PARALLEL";

/// Name of the state directory inside a project.
pub const STATE_DIR: &str = ".phasegate";
/// Name of the configuration file inside the state directory.
pub const CONFIG_FILE: &str = "phasegate.toml";

/// Project-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectSection {
    /// Project name (optional, defaults to directory name)
    #[serde(default)]
    pub name: Option<String>,
}

/// Session budget settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionsSection {
    /// Usage fraction at which a session is forced to checkpoint and end
    #[serde(default = "default_usage_ceiling")]
    pub usage_ceiling: f64,
    /// Open the next session for the same agent after a forced yield
    #[serde(default = "default_auto_continue")]
    pub auto_continue: bool,
}

fn default_usage_ceiling() -> f64 {
    0.8
}

fn default_auto_continue() -> bool {
    true
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            usage_ceiling: default_usage_ceiling(),
            auto_continue: default_auto_continue(),
        }
    }
}

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulingSection {
    /// Maximum active sessions across the project
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_max_parallel() -> usize {
    4
}

impl Default for SchedulingSection {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

/// Checkpoint store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointsSection {
    /// Retries after the first failed append
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff; attempt n waits n times this
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl Default for CheckpointsSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write a daily rolling file under `.phasegate/logs/`
    #[serde(default = "default_log_file")]
    pub file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> bool {
    true
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: default_log_file(),
        }
    }
}

/// The complete phasegate.toml configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PhasegateToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub sessions: SessionsSection,
    #[serde(default)]
    pub scheduling: SchedulingSection,
    #[serde(default)]
    pub checkpoints: CheckpointsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl PhasegateToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse phasegate.toml")
    }

    /// Load from `<state_dir>/phasegate.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize phasegate.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let ceiling = self.sessions.usage_ceiling;
        if !(ceiling > 0.0 && ceiling <= 1.0) {
            problems.push(format!(
                "Invalid sessions.usage_ceiling {}: must be in (0.0, 1.0]",
                ceiling
            ));
        }

        if self.scheduling.max_parallel == 0 {
            problems.push("Invalid scheduling.max_parallel 0: must be at least 1".to_string());
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            problems.push(format!(
                "Invalid logging.level '{}': not a valid filter directive",
                self.logging.level
            ));
        }

        problems
    }
}

/// Configuration that combines phasegate.toml with environment and CLI
/// overrides.
#[derive(Debug, Clone)]
pub struct PhasegateConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .phasegate directory
    pub state_dir: PathBuf,
    /// Parsed phasegate.toml configuration
    pub toml: PhasegateToml,
    /// CLI override for max_parallel
    pub cli_max_parallel: Option<usize>,
    /// CLI override for usage_ceiling
    pub cli_usage_ceiling: Option<f64>,
}

impl PhasegateConfig {
    /// Load configuration for a project directory.
    pub fn new(project_dir: &Path) -> Result<Self> {
        let state_dir = project_dir.join(STATE_DIR);
        let toml = PhasegateToml::load_or_default(&state_dir)?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            state_dir,
            toml,
            cli_max_parallel: None,
            cli_usage_ceiling: None,
        })
    }

    /// Configuration with defaults only, for embedding and tests.
    pub fn in_memory(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            state_dir: project_dir.join(STATE_DIR),
            toml: PhasegateToml::default(),
            cli_max_parallel: None,
            cli_usage_ceiling: None,
        }
    }

    /// Apply CLI overrides.
    pub fn with_cli_args(
        mut self,
        max_parallel: Option<usize>,
        usage_ceiling: Option<f64>,
    ) -> Self {
        self.cli_max_parallel = max_parallel;
        self.cli_usage_ceiling = usage_ceiling;
        self
    }

    /// Project name: file, then directory name.
    pub fn project_name(&self) -> String {
        self.toml.project.name.clone().unwrap_or_else(|| {
            self.project_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "project".to_string())
        })
    }

    /// Usage ceiling (CLI → env → file).
    pub fn usage_ceiling(&self) -> f64 {
        self.cli_usage_ceiling
            .or_else(|| env_parse(ENV_USAGE_CEILING))
            .unwrap_or(self.toml.sessions.usage_ceiling)
    }

    /// Max parallel sessions (CLI → env → file).
    pub fn max_parallel(&self) -> usize {
        self.cli_max_parallel
            .or_else(|| env_parse(ENV_MAX_PARALLEL))
            .unwrap_or(self.toml.scheduling.max_parallel)
    }

    pub fn auto_continue(&self) -> bool {
        self.toml.sessions.auto_continue
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.toml.checkpoints.max_retries,
            self.toml.checkpoints.retry_backoff_ms,
        )
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default().with_max_parallel(self.max_parallel())
    }

    /// Get path to phasegate.toml.
    pub fn config_file(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE)
    }

    /// Get path to the persisted project.
    pub fn project_file(&self) -> PathBuf {
        self.state_dir.join("project.json")
    }

    /// Get path to the lock serializing writers.
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("project.lock")
    }

    /// Get path to the checkpoint log.
    pub fn checkpoints_file(&self) -> PathBuf {
        self.state_dir.join("checkpoints.jsonl")
    }

    /// Get path to the log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Validate configuration, including effective overrides.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.toml.validate();
        let ceiling = self.usage_ceiling();
        if ceiling != self.toml.sessions.usage_ceiling && !(ceiling > 0.0 && ceiling <= 1.0) {
            problems.push(format!(
                "Invalid effective usage ceiling {}: must be in (0.0, 1.0]",
                ceiling
            ));
        }
        if self.max_parallel() == 0 && self.toml.scheduling.max_parallel != 0 {
            problems.push("Invalid effective max_parallel 0: must be at least 1".to_string());
        }
        problems
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
