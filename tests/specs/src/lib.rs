// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenarios across the telemetry store,
//! the dashboard engine, and the launcher.
//!
//! Everything runs against a throwaway store under a temp directory;
//! launcher children are stock shell commands (`sleep`, `sh -c`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use asf_dashboard::adapter::StoreAdapter;
use asf_dashboard::poller::PollingDriver;
use asf_dashboard::state::StateStore;
use asf_launcher::config::LauncherConfig;
use asf_launcher::pidfile::PidFile;
use asf_launcher::supervisor::{Launcher, Timing};
use asf_telemetry::client::{ClientConfig, TelemetryClient};
use asf_telemetry::store::Store;

/// One disposable swarm environment.
pub struct SwarmRig {
    dir: tempfile::TempDir,
}

impl SwarmRig {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { dir: tempfile::tempdir()? })
    }

    /// Path of the shared store file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join(".asf").join("swarm_state.db")
    }

    /// Path of the launcher PID-file.
    pub fn pidfile_path(&self) -> PathBuf {
        self.dir.path().join(".asf").join("launcher.pid")
    }

    /// Raw store handle (write side, as an agent process would own).
    pub fn store(&self) -> anyhow::Result<Store> {
        Ok(Store::open(self.db_path())?)
    }

    /// Telemetry client with a compressed heartbeat.
    pub fn client(&self, max_log_entries: usize) -> anyhow::Result<TelemetryClient> {
        Ok(TelemetryClient::open(ClientConfig {
            db_path: self.db_path(),
            heartbeat_interval: Duration::from_millis(50),
            max_log_entries,
        })?)
    }

    /// Dashboard read side with the given dead threshold.
    pub fn adapter(&self, dead_after_ms: u64) -> anyhow::Result<Arc<StoreAdapter>> {
        Ok(Arc::new(StoreAdapter::open(self.db_path(), dead_after_ms)?))
    }

    /// Polling engine over a fresh state store.
    pub fn engine(
        &self,
        dead_after_ms: u64,
        interval_ms: u64,
    ) -> anyhow::Result<(PollingDriver, Arc<StateStore>)> {
        let state = Arc::new(StateStore::new());
        let driver =
            PollingDriver::new(self.adapter(dead_after_ms)?, Arc::clone(&state), interval_ms);
        Ok((driver, state))
    }

    /// Launcher with compressed sequencing delays.
    pub fn launcher(&self, config: LauncherConfig) -> Launcher {
        Launcher::with_pidfile(config, PidFile::new(self.pidfile_path())).with_timing(Timing {
            readiness_delay: Duration::from_millis(20),
            stagger: Duration::from_millis(5),
            stop_poll: Duration::from_millis(20),
            force_wait: Duration::from_millis(2000),
        })
    }

    /// A launcher config whose children are plain `sleep`s.
    pub fn stub_config(&self, agents: u32, dashboard: bool) -> LauncherConfig {
        let mut config = LauncherConfig::default();
        config.dashboard.enabled = dashboard;
        config.dashboard.command = vec!["sleep".to_owned(), "30".to_owned()];
        config.dashboard.db_path = self.db_path();
        config.agents.count = agents;
        config.agents.command = vec!["sleep".to_owned(), "30".to_owned()];
        config.shutdown.grace_period = 2000;
        config.shutdown.force_after = 4000;
        config
    }
}
