// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;
use crate::config::{AgentsSection, DashboardSection, ShutdownSection};

fn fast_timing() -> Timing {
    Timing {
        readiness_delay: Duration::from_millis(20),
        stagger: Duration::from_millis(5),
        stop_poll: Duration::from_millis(20),
        force_wait: Duration::from_millis(2000),
    }
}

fn test_config(agents: u32, dashboard: bool) -> LauncherConfig {
    LauncherConfig {
        dashboard: DashboardSection {
            enabled: dashboard,
            command: vec!["sleep".to_owned(), "30".to_owned()],
            ..DashboardSection::default()
        },
        agents: AgentsSection {
            count: agents,
            command: vec!["sleep".to_owned(), "30".to_owned()],
            ..AgentsSection::default()
        },
        shutdown: ShutdownSection { grace_period: 2000, force_after: 4000 },
        ..LauncherConfig::default()
    }
}

fn launcher(dir: &tempfile::TempDir, config: LauncherConfig) -> Launcher {
    let pidfile = PidFile::new(dir.path().join(".asf").join("launcher.pid"));
    Launcher::with_pidfile(config, pidfile).with_timing(fast_timing())
}

/// Collect events until `done` matches one or the timeout lapses.
async fn collect_until(
    rx: &mut broadcast::Receiver<LauncherEvent>,
    done: impl Fn(&LauncherEvent) -> bool,
    timeout: Duration,
) -> Vec<LauncherEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => {
                let stop = done(&event);
                events.push(event);
                if stop {
                    return events;
                }
            }
            _ => return events,
        }
    }
}

#[tokio::test]
async fn lifecycle_start_children_ready_stop_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(&dir, test_config(2, true));
    let mut rx = launcher.subscribe();

    launcher.start().await.unwrap();
    let events = collect_until(
        &mut rx,
        |e| matches!(e, LauncherEvent::Ready),
        Duration::from_secs(5),
    )
    .await;

    // Dashboard first, then the agents in spawn order, then Ready.
    let starts: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            LauncherEvent::ProcessStart { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec!["dashboard", "agent-01", "agent-02"]);
    assert!(matches!(events.last(), Some(LauncherEvent::Ready)));
    assert_eq!(launcher.state(), LauncherState::Running);
    assert!(launcher.pidfile().exists(), "pid file lives between ready and shutdown");

    launcher.stop(false).await.unwrap();
    let events = collect_until(
        &mut rx,
        |e| matches!(e, LauncherEvent::Shutdown),
        Duration::from_secs(5),
    )
    .await;

    let stops = events
        .iter()
        .filter(|e| matches!(e, LauncherEvent::ProcessStop { .. }))
        .count();
    assert_eq!(stops, 3, "every child reports a stop: {events:?}");
    assert!(matches!(events.last(), Some(LauncherEvent::Shutdown)));
    assert!(!launcher.pidfile().exists());
    assert_eq!(launcher.state(), LauncherState::Stopped);
    assert!(launcher.pool_snapshot().iter().all(|p| p.status.is_terminal()));
}

#[tokio::test]
async fn start_twice_fails_the_second_call() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(&dir, test_config(1, false));
    launcher.start().await.unwrap();

    let err = launcher.start().await.unwrap_err();
    assert!(matches!(err, LauncherError::AlreadyRunning { .. }));

    launcher.stop(true).await.unwrap();
}

#[tokio::test]
async fn live_pidfile_blocks_a_second_launcher() {
    let dir = tempfile::tempdir().unwrap();
    let first = launcher(&dir, test_config(1, false));
    first.start().await.unwrap();

    let second = Launcher::with_pidfile(
        test_config(1, false),
        PidFile::new(dir.path().join(".asf").join("launcher.pid")),
    )
    .with_timing(fast_timing());
    let err = second.start().await.unwrap_err();
    assert!(matches!(err, LauncherError::AlreadyRunning { .. }));

    first.stop(true).await.unwrap();
}

#[tokio::test]
async fn stop_twice_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(&dir, test_config(1, false));
    let mut rx = launcher.subscribe();

    launcher.start().await.unwrap();
    launcher.stop(false).await.unwrap();
    launcher.stop(false).await.unwrap();

    let events =
        collect_until(&mut rx, |e| matches!(e, LauncherEvent::Shutdown), Duration::from_secs(5))
            .await;
    let shutdowns = events.iter().filter(|e| matches!(e, LauncherEvent::Shutdown)).count();
    assert_eq!(shutdowns, 1);
}

#[tokio::test]
async fn no_dashboard_spawns_agents_only() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = launcher(&dir, test_config(2, false));
    let mut rx = launcher.subscribe();

    launcher.start().await.unwrap();
    let events =
        collect_until(&mut rx, |e| matches!(e, LauncherEvent::Ready), Duration::from_secs(5))
            .await;
    let starts: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            LauncherEvent::ProcessStart { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec!["agent-01", "agent-02"]);
    assert!(launcher.pool_snapshot().iter().all(|p| p.kind == ProcessKind::Agent));

    launcher.stop(true).await.unwrap();
}

#[tokio::test]
async fn spawn_failure_aborts_start_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, false);
    config.agents.command = vec!["definitely-not-a-binary-xyz".to_owned()];
    let launcher = launcher(&dir, config);

    let err = launcher.start().await.unwrap_err();
    assert!(matches!(err, LauncherError::SpawnFailed { .. }));
    assert_eq!(launcher.state(), LauncherState::Stopped);
    assert!(!launcher.pidfile().exists());
}

#[tokio::test]
async fn agent_env_carries_the_contract_variables() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("env-probe");
    let mut config = test_config(1, false);
    config.agents.command = vec![
        "sh".to_owned(),
        "-c".to_owned(),
        format!("echo \"$ASF_AGENT_ID $ASF_QUIET_MODE $ASF_DB_PATH\" > {}", marker.display()),
    ];
    config.dashboard.db_path = dir.path().join("swarm_state.db");
    let launcher = launcher(&dir, config);

    launcher.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    launcher.stop(false).await.unwrap();

    let probe = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(probe.trim(), format!("agent-01 true {}", dir.path().join("swarm_state.db").display()));
}

#[tokio::test]
async fn worktrees_are_assigned_in_spawn_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(3, false);
    config.worktrees = vec!["/wt/alpha".to_owned(), "/wt/beta".to_owned()];
    let launcher = launcher(&dir, config);

    launcher.start().await.unwrap();
    let pool = launcher.pool_snapshot();
    assert_eq!(pool[0].worktree.as_deref(), Some("/wt/alpha"));
    assert_eq!(pool[1].worktree.as_deref(), Some("/wt/beta"));
    assert_eq!(pool[2].worktree, None, "fleet can outnumber worktrees");

    launcher.stop(true).await.unwrap();
}

#[tokio::test]
async fn crashes_respect_the_restart_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, false);
    config.agents.command = vec!["sh".to_owned(), "-c".to_owned(), "exit 1".to_owned()];
    config.agents.auto_restart = true;
    config.agents.max_restarts = 3;
    // Below the validated minimum on purpose; tests drive the struct
    // directly to keep the clock short.
    config.agents.restart_delay = 30;
    let launcher = launcher(&dir, config);
    let mut rx = launcher.subscribe();

    launcher.start().await.unwrap();
    let events = collect_until(
        &mut rx,
        |e| matches!(e, LauncherEvent::ProcessCrash { will_restart: false, .. }),
        Duration::from_secs(10),
    )
    .await;

    let crashes: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            LauncherEvent::ProcessCrash { will_restart, .. } => Some(*will_restart),
            _ => None,
        })
        .collect();
    assert_eq!(crashes, vec![true, true, true, false], "three restarts, then give up");

    // The final state is Crashed with the exit code recorded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let pool = launcher.pool_snapshot();
    assert_eq!(pool[0].status, ProcessStatus::Crashed);
    assert_eq!(pool[0].exit_code, Some(1));
    assert_eq!(pool[0].restart_count, 4, "post-increment counting");

    launcher.stop(true).await.unwrap();
}

#[tokio::test]
async fn auto_restart_off_leaves_the_agent_crashed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, false);
    config.agents.command = vec!["sh".to_owned(), "-c".to_owned(), "exit 1".to_owned()];
    let launcher = launcher(&dir, config);
    let mut rx = launcher.subscribe();

    launcher.start().await.unwrap();
    let events = collect_until(
        &mut rx,
        |e| matches!(e, LauncherEvent::ProcessCrash { .. }),
        Duration::from_secs(5),
    )
    .await;
    assert!(matches!(
        events.last(),
        Some(LauncherEvent::ProcessCrash { will_restart: false, .. })
    ));

    launcher.stop(true).await.unwrap();
}

#[tokio::test]
async fn sigterm_resistant_children_get_escalated() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(1, false);
    // The shell ignores SIGTERM and respawns its sleep; only SIGKILL
    // ends the tree.
    config.agents.command =
        vec!["sh".to_owned(), "-c".to_owned(), "trap '' TERM; while :; do sleep 1; done".to_owned()];
    config.shutdown.grace_period = 1000;
    let launcher = launcher(&dir, config);

    launcher.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let begun = tokio::time::Instant::now();
    launcher.stop(false).await.unwrap();
    let elapsed = begun.elapsed();

    assert!(elapsed >= Duration::from_millis(1000), "grace window was honored: {elapsed:?}");
    assert!(launcher.pool_snapshot().iter().all(|p| p.status.is_terminal()));
    assert!(!launcher.pidfile().exists());
}
