// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Fastest accepted poll cadence.
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
/// Slowest accepted poll cadence.
pub const MAX_POLL_INTERVAL_MS: u64 = 2000;
/// Keyboard step for `+` / `-` interval adjustment.
pub const POLL_INTERVAL_STEP_MS: u64 = 250;

/// War-room dashboard for ASF agent swarms.
#[derive(Debug, Clone, Parser)]
#[command(name = "asf-dashboard", version, about)]
pub struct Config {
    /// Path of the shared telemetry store.
    #[arg(long, env = "ASF_DB_PATH", default_value = ".asf/swarm_state.db")]
    pub db_path: PathBuf,

    /// Poll interval in milliseconds.
    #[arg(long, env = "ASF_POLL_INTERVAL", default_value = "500")]
    pub poll_interval: u64,

    /// Milliseconds of heartbeat silence before an agent renders Dead.
    #[arg(long, env = "ASF_DEAD_THRESHOLD", default_value = "30000")]
    pub dead_agent_threshold: u64,

    /// Agent grid rows.
    #[arg(long, default_value = "2")]
    pub grid_rows: u16,

    /// Agent grid columns.
    #[arg(long, default_value = "4")]
    pub grid_cols: u16,

    /// Log file path. The terminal belongs to the widgets, so tracing
    /// output goes to a file or nowhere.
    #[arg(long, env = "ASF_DASHBOARD_LOG")]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval) {
            anyhow::bail!(
                "poll interval {} out of range [{MIN_POLL_INTERVAL_MS}, {MAX_POLL_INTERVAL_MS}]",
                self.poll_interval
            );
        }
        if self.dead_agent_threshold < 1000 {
            anyhow::bail!(
                "dead agent threshold {} below minimum 1000",
                self.dead_agent_threshold
            );
        }
        if !(1..=10).contains(&self.grid_rows) {
            anyhow::bail!("grid rows {} out of range [1, 10]", self.grid_rows);
        }
        if !(1..=10).contains(&self.grid_cols) {
            anyhow::bail!("grid cols {} out of range [1, 10]", self.grid_cols);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(".asf/swarm_state.db"),
            poll_interval: 500,
            dead_agent_threshold: 30_000,
            grid_rows: 2,
            grid_cols: 4,
            log_file: None,
        }
    }
}

/// Clamp a requested poll interval into the accepted range.
pub fn clamp_poll_interval(ms: u64) -> u64 {
    ms.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
