// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard engine: wires the polling driver, the state store, the
//! key loop, and the renderer into one select-loop.
//!
//! All state mutation happens on this task; the poll loop and the
//! blocking key-reader thread only talk to it through channels.

use std::sync::Arc;

use crossterm::event::{Event, KeyEventKind};
use ratatui::DefaultTerminal;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapter::StoreAdapter;
use crate::config::{Config, POLL_INTERVAL_STEP_MS};
use crate::keys::{map_key, step_selection, step_selection_row, Action, Focus};
use crate::poller::{EngineEvent, PollingDriver};
use crate::state::{ChangeKind, StateStore};
use crate::widgets::{self, logs::LogView};

/// The dashboard application.
pub struct App {
    config: Config,
    state: Arc<StateStore>,
    driver: PollingDriver,
    focus: Focus,
    log_view: LogView,
}

impl App {
    /// Open the store read side and build a stopped engine. An
    /// unreachable store fails here, before the terminal is touched.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let adapter =
            Arc::new(StoreAdapter::open(&config.db_path, config.dead_agent_threshold)?);
        let state = Arc::new(StateStore::new());
        let driver = PollingDriver::new(adapter, Arc::clone(&state), config.poll_interval);
        Ok(Self { config, state, driver, focus: Focus::default(), log_view: LogView::default() })
    }

    /// Run until `q`/Ctrl-C. Returns after stopping the poll loop.
    pub async fn run(mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        let mut engine_rx = self.driver.subscribe();
        let mut change_rx = self.state.subscribe();
        let shutdown = CancellationToken::new();
        let mut key_rx = spawn_key_reader(shutdown.clone());

        self.driver.start();
        self.draw(terminal)?;

        loop {
            tokio::select! {
                event = engine_rx.recv() => match event {
                    Ok(EngineEvent::Update) => self.draw(terminal)?,
                    Ok(EngineEvent::Error(e)) => {
                        // A flaky read is not fatal; the schedule goes on.
                        warn!("poll error: {e}");
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => self.draw(terminal)?,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                change = change_rx.recv() => match change {
                    Ok(ChangeKind::Selection) => {
                        // New agent, new log pane: pin back to bottom and
                        // refresh so the pane fills without waiting a tick.
                        self.log_view.reset();
                        self.driver.force_poll();
                        self.draw(terminal)?;
                    }
                    Ok(ChangeKind::Data) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => self.draw(terminal)?,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = key_rx.recv() => match event {
                    Some(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                        if let Some(action) = map_key(key, self.focus) {
                            if self.apply(action) {
                                break;
                            }
                            self.draw(terminal)?;
                        }
                    }
                    Some(Event::Resize(_, _)) => self.draw(terminal)?,
                    Some(_) => {}
                    None => break,
                },
            }
        }

        shutdown.cancel();
        self.driver.stop();
        Ok(())
    }

    /// Apply one decoded action. Returns true on exit.
    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Exit => return true,
            Action::SelectPrev | Action::SelectNext => {
                let ids = self.fleet_ids();
                let current = self.state.selected_agent_id();
                let next =
                    step_selection(&ids, current.as_deref(), action == Action::SelectNext);
                if next.is_some() {
                    self.focus = Focus::Grid;
                    self.state.select_agent(next);
                }
            }
            Action::SelectRowUp | Action::SelectRowDown => {
                let ids = self.fleet_ids();
                let current = self.state.selected_agent_id();
                if let Some(next) = step_selection_row(
                    &ids,
                    current.as_deref(),
                    usize::from(self.config.grid_cols),
                    action == Action::SelectRowDown,
                ) {
                    self.state.select_agent(Some(next));
                }
            }
            Action::FocusLogs => self.focus = Focus::Logs,
            Action::ClearSelection => {
                self.focus = Focus::Grid;
                self.state.clear_selection();
            }
            Action::ForcePoll => self.driver.force_poll(),
            Action::IntervalUp => {
                let next = self.driver.interval_ms().saturating_add(POLL_INTERVAL_STEP_MS);
                debug!("poll interval -> {}", self.driver.set_interval(next));
            }
            Action::IntervalDown => {
                let next = self.driver.interval_ms().saturating_sub(POLL_INTERVAL_STEP_MS);
                debug!("poll interval -> {}", self.driver.set_interval(next));
            }
            Action::ScrollUp | Action::ScrollDown => {
                let state = self.state.get_state();
                let total = state
                    .selected_agent_id
                    .as_ref()
                    .and_then(|id| state.logs.get(id))
                    .map(Vec::len)
                    .unwrap_or(0);
                // Viewport estimate: right pane minus borders. Exact
                // height is recomputed at draw time; the view clamps.
                let viewport = 20;
                if action == Action::ScrollUp {
                    self.log_view.scroll_up(total, viewport);
                } else {
                    self.log_view.scroll_down(total, viewport);
                }
            }
        }
        false
    }

    fn fleet_ids(&self) -> Vec<String> {
        self.state.get_state().agents.iter().map(|a| a.agent.id.clone()).collect()
    }

    fn draw(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        let state = self.state.get_state();
        let mut tasks = state.tasks.clone();
        widgets::tasks::sort_tasks(&mut tasks);
        let selected = state.selected_agent_id.clone();
        let logs = selected
            .as_ref()
            .and_then(|id| state.logs.get(id))
            .cloned()
            .unwrap_or_default();

        terminal.draw(|frame| {
            let regions = widgets::split(frame.area());
            widgets::header::render(frame, regions.header, &state.metrics);
            widgets::grid::render(
                frame,
                regions.grid,
                &state.agents,
                selected.as_deref(),
                self.config.grid_rows,
                self.config.grid_cols,
            );
            widgets::tasks::render(frame, regions.tasks, &tasks, 0);
            widgets::logs::render(frame, regions.logs, selected.as_deref(), &logs, &self.log_view);
        })?;
        Ok(())
    }
}

/// Blocking crossterm reader on its own thread. Keeps the async side
/// clean: the thread ends when the terminal closes or shutdown is
/// observed after the next event.
fn spawn_key_reader(shutdown: CancellationToken) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match crossterm::event::read() {
                Ok(event) => {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
