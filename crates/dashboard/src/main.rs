// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing_subscriber::EnvFilter;

use asf_dashboard::app::App;
use asf_dashboard::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    // The terminal belongs to the widgets; tracing goes to a file or
    // nowhere at all.
    if let Some(ref path) = config.log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::from_default_env())
                    .with_writer(std::sync::Arc::new(file))
                    .with_ansi(false)
                    .init();
            }
            Err(e) => {
                eprintln!("error: cannot open log file {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    // Open the store before touching the terminal so a missing store
    // fails loudly instead of flashing an empty screen.
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal).await;
    ratatui::restore();

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
