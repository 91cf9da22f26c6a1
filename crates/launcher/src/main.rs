// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::error;
use tracing_subscriber::EnvFilter;

use asf_launcher::config::LauncherConfig;
use asf_launcher::pidfile::{is_process_alive, PidFile};
use asf_launcher::spawn::signal_tree;
use asf_launcher::status::{render_logs, render_status};
use asf_launcher::supervisor::{Launcher, LauncherEvent, DEFAULT_PIDFILE};

/// Launcher for ASF agent swarms.
#[derive(Debug, Parser)]
#[command(name = "asf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Start the dashboard and agent fleet.
    Start(StartArgs),
    /// Stop a running launcher from any terminal.
    Stop(StopArgs),
    /// Show launcher and fleet status.
    Status,
    /// Print whisper logs for one agent or the whole fleet.
    Logs(LogsArgs),
}

#[derive(Debug, clap::Args)]
struct StartArgs {
    /// Number of agents (overrides the config file).
    #[arg(long)]
    agents: Option<u32>,

    /// Path to the launcher configuration file.
    #[arg(long, env = "ASF_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the dashboard child.
    #[arg(long)]
    no_dashboard: bool,

    /// Verbose logging.
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, clap::Args)]
struct StopArgs {
    /// SIGKILL instead of a graceful SIGTERM.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, clap::Args)]
struct LogsArgs {
    /// Agent id; omit for the whole fleet.
    agent_id: Option<String>,

    /// Maximum entries per agent.
    #[arg(long, default_value = "50")]
    limit: usize,

    /// Path to the launcher configuration file.
    #[arg(long, env = "ASF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    std::process::exit(match cli.command {
        Commands::Start(args) => run_start(args).await,
        Commands::Stop(args) => run_stop(args),
        Commands::Status => run_status(),
        Commands::Logs(args) => run_logs(args),
    });
}

async fn run_start(args: StartArgs) -> i32 {
    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let mut config = match LauncherConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return 1;
        }
    };
    if let Some(count) = args.agents {
        config.agents.count = count;
    }
    if args.no_dashboard {
        config.dashboard.enabled = false;
    }
    if let Err(e) = config.validate() {
        error!("{e}");
        return 1;
    }

    let launcher = Arc::new(Launcher::new(config));
    let mut events = launcher.subscribe();
    if let Err(e) = launcher.install_signal_handlers() {
        error!("cannot register signal handlers: {e}");
        return 1;
    }
    if let Err(e) = launcher.start().await {
        error!("{e}");
        return 1;
    }

    // Foreground until the stop sequence finishes (signal-driven).
    loop {
        match events.recv().await {
            Ok(LauncherEvent::Shutdown) | Err(_) => break,
            Ok(_) => {}
        }
    }
    0
}

fn run_stop(args: StopArgs) -> i32 {
    let pidfile = PidFile::new(DEFAULT_PIDFILE);
    let payload = match pidfile.read() {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            println!("launcher: not running");
            return 0;
        }
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    if !is_process_alive(payload.launcher_pid) {
        // Stale lock: clean up the file and any recorded stragglers.
        for p in &payload.processes {
            let _ = signal_tree(p.pid, Signal::SIGKILL);
        }
        let _ = pidfile.remove();
        println!("launcher: not running (cleaned stale pid file)");
        return 0;
    }

    let Ok(pid) = i32::try_from(payload.launcher_pid) else {
        eprintln!("error: pid {} out of range", payload.launcher_pid);
        return 1;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        eprintln!("error: cannot signal launcher: {e}");
        return 1;
    }
    if args.force {
        // Don't wait on cooperation: take the child trees down too.
        std::thread::sleep(Duration::from_millis(200));
        for p in &payload.processes {
            let _ = signal_tree(p.pid, Signal::SIGKILL);
        }
        let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
        let _ = pidfile.remove();
    }
    println!("stop signal sent to pid {}", payload.launcher_pid);
    0
}

fn run_status() -> i32 {
    match render_status(&PidFile::new(DEFAULT_PIDFILE)) {
        Ok((running, text)) => {
            println!("{text}");
            i32::from(!running)
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

fn run_logs(args: LogsArgs) -> i32 {
    let db_path = match LauncherConfig::load(args.config.as_deref()) {
        Ok(config) => config.dashboard.db_path,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };
    match render_logs(&db_path, args.agent_id.as_deref(), args.limit) {
        Ok(text) => {
            println!("{text}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
