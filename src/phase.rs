//! Phase definitions and JSON loading.
//!
//! This module provides:
//! - `PhaseDef`, the static definition of one dependency-gated phase
//! - `PhasesFile`, the phases.json format accepted by `phasegate define`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Static definition of a single phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseDef {
    /// Unique identifier (e.g., "scaffold", "auth")
    pub id: String,
    /// Human-readable label
    #[serde(default)]
    pub label: String,
    /// Owning-role tag, opaque to the orchestrator
    #[serde(default)]
    pub owner_role: String,
    /// Identifiers of prerequisite phases
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Phases sharing any of these tags never run concurrently
    #[serde(default)]
    pub exclusive_tags: Vec<String>,
}

impl PhaseDef {
    /// Create a new phase definition.
    pub fn new(id: &str, label: &str, depends_on: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            owner_role: String::new(),
            depends_on,
            exclusive_tags: Vec::new(),
        }
    }

    pub fn with_owner_role(mut self, role: &str) -> Self {
        self.owner_role = role.to_string();
        self
    }

    pub fn with_exclusive_tags(mut self, tags: Vec<String>) -> Self {
        self.exclusive_tags = tags;
        self
    }

    /// Label for display, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// The phases.json file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PhasesFile {
    /// Optional project name; `phasegate.toml` wins when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Phases in definition order
    pub phases: Vec<PhaseDef>,
}

impl PhasesFile {
    /// Load phases from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read phases file: {}", path.display()))?;

        let phases_file: PhasesFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse phases JSON: {}", path.display()))?;

        Ok(phases_file)
    }

    /// Save phases to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize phases to JSON")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write phases file: {}", path.display()))?;

        Ok(())
    }

    /// Get a specific phase by id.
    pub fn get_phase(&self, id: &str) -> Option<&PhaseDef> {
        self.phases.iter().find(|p| p.id == id)
    }
}
