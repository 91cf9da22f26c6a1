// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launcher configuration: a JSON file with per-section defaults.
//!
//! A missing or empty file yields the defaults; every constraint is
//! checked on load so a bad config aborts start instead of surfacing
//! mid-shutdown.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LauncherError, Result};

/// Dashboard child settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSection {
    pub enabled: bool,
    /// Poll interval handed to the dashboard via `ASF_POLL_INTERVAL`.
    pub poll_interval: u64,
    pub db_path: PathBuf,
    /// Command vector for the dashboard child.
    pub command: Vec<String>,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: 500,
            db_path: PathBuf::from(".asf/swarm_state.db"),
            command: vec!["asf-dashboard".to_owned()],
        }
    }
}

/// Agent fleet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentsSection {
    pub count: u32,
    pub default_role: String,
    pub quiet_mode: bool,
    pub auto_restart: bool,
    /// Milliseconds to wait before respawning a crashed agent.
    pub restart_delay: u64,
    pub max_restarts: u32,
    /// Command vector for agent children.
    pub command: Vec<String>,
}

impl Default for AgentsSection {
    fn default() -> Self {
        Self {
            count: 4,
            default_role: "developer".to_owned(),
            quiet_mode: true,
            auto_restart: false,
            restart_delay: 5000,
            max_restarts: 3,
            command: vec!["asf-agent".to_owned()],
        }
    }
}

/// Shutdown windows, both in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShutdownSection {
    /// Cooperative window before SIGKILL escalation.
    pub grace_period: u64,
    /// Outer bound enforced by the CLI layer.
    pub force_after: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self { grace_period: 10_000, force_after: 15_000 }
    }
}

/// Top-level launcher configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LauncherConfig {
    pub dashboard: DashboardSection,
    pub agents: AgentsSection,
    /// Worktree paths handed to agents in spawn order.
    pub worktrees: Vec<String>,
    /// Seed task titles; opaque to the launcher.
    pub tasks: Vec<String>,
    pub shutdown: ShutdownSection,
}

impl LauncherConfig {
    /// Load from a JSON file. A missing path or empty file yields the
    /// defaults. The result is always validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => Self::default(),
            Some(path) => match std::fs::read_to_string(path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => {
                    return Err(LauncherError::ConfigInvalid(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                }
                Ok(text) if text.trim().is_empty() => Self::default(),
                Ok(text) => serde_json::from_str(&text).map_err(|e| {
                    LauncherError::ConfigInvalid(format!("{}: {e}", path.display()))
                })?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every range and cross-field constraint.
    pub fn validate(&self) -> Result<()> {
        if !(100..=5000).contains(&self.dashboard.poll_interval) {
            return Err(LauncherError::ConfigInvalid(format!(
                "dashboard.pollInterval {} out of range [100, 5000]",
                self.dashboard.poll_interval
            )));
        }
        if !(1..=50).contains(&self.agents.count) {
            return Err(LauncherError::ConfigInvalid(format!(
                "agents.count {} out of range [1, 50]",
                self.agents.count
            )));
        }
        if self.agents.restart_delay < 1000 {
            return Err(LauncherError::ConfigInvalid(format!(
                "agents.restartDelay {} below minimum 1000",
                self.agents.restart_delay
            )));
        }
        if self.agents.max_restarts > 10 {
            return Err(LauncherError::ConfigInvalid(format!(
                "agents.maxRestarts {} out of range [0, 10]",
                self.agents.max_restarts
            )));
        }
        if self.shutdown.grace_period < 1000 {
            return Err(LauncherError::ConfigInvalid(format!(
                "shutdown.gracePeriod {} below minimum 1000",
                self.shutdown.grace_period
            )));
        }
        if self.shutdown.force_after < 1000 {
            return Err(LauncherError::ConfigInvalid(format!(
                "shutdown.forceAfter {} below minimum 1000",
                self.shutdown.force_after
            )));
        }
        if self.shutdown.force_after <= self.shutdown.grace_period {
            return Err(LauncherError::ConfigInvalid(format!(
                "shutdown.forceAfter {} must exceed gracePeriod {}",
                self.shutdown.force_after, self.shutdown.grace_period
            )));
        }
        if self.dashboard.enabled && self.dashboard.command.is_empty() {
            return Err(LauncherError::ConfigInvalid(
                "dashboard.command must not be empty".to_owned(),
            ));
        }
        if self.agents.command.is_empty() {
            return Err(LauncherError::ConfigInvalid("agents.command must not be empty".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
