// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only CLI views: `asf status` and `asf logs`.
//!
//! Both read shared files the supervisor and agents own; neither
//! touches a child process or costs an agent a single token.

use std::path::Path;

use asf_telemetry::schema::epoch_ms;
use asf_telemetry::store::Store;

use crate::pidfile::{is_process_alive, PidFile};

/// Human-readable launcher status. Returns `true` when a live
/// launcher was found.
pub fn render_status(pidfile: &PidFile) -> anyhow::Result<(bool, String)> {
    let Some(payload) = pidfile.read()? else {
        return Ok((false, "launcher: not running".to_owned()));
    };
    if !is_process_alive(payload.launcher_pid) {
        return Ok((
            false,
            format!("launcher: not running (stale pid file, pid {})", payload.launcher_pid),
        ));
    }

    let uptime_s = epoch_ms().saturating_sub(payload.started_at) / 1000;
    let mut out = format!(
        "launcher: running (pid {}, up {uptime_s}s)\n",
        payload.launcher_pid
    );
    for p in &payload.processes {
        let alive = if is_process_alive(p.pid) { "alive" } else { "gone" };
        out.push_str(&format!(
            "  {:<12} {:<9} pid {:<7} restarts {} [{alive}]\n",
            p.id,
            p.kind.as_str(),
            p.pid,
            p.restart_count,
        ));
    }
    Ok((true, out))
}

/// Newest-first whisper logs, for one agent or grouped across the
/// active fleet.
pub fn render_logs(
    db_path: &Path,
    agent_id: Option<&str>,
    limit: usize,
) -> anyhow::Result<String> {
    let store = Store::open(db_path)?;
    let mut out = String::new();

    let targets: Vec<String> = match agent_id {
        Some(id) => vec![id.to_owned()],
        None => store.agents()?.into_iter().map(|a| a.id).collect(),
    };
    if targets.is_empty() {
        return Ok("no active agents".to_owned());
    }

    for id in targets {
        let entries = store.logs_for_agent(&id, limit)?;
        out.push_str(&format!("{id}:\n"));
        if entries.is_empty() {
            out.push_str("  (no logs)\n");
            continue;
        }
        for entry in entries {
            out.push_str(&format!(
                "  [{}] {:<5} {}\n",
                entry.timestamp,
                entry.level.as_str(),
                entry.message
            ));
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
