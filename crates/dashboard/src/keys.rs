// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyboard contract: raw key events to engine actions.
//!
//! Arrow keys are context-sensitive — they move the fleet selection
//! while the grid has focus and scroll while the whisper log does.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which region receives directional keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Grid,
    Logs,
}

/// Engine-level action decoded from one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Exit,
    SelectPrev,
    SelectNext,
    SelectRowUp,
    SelectRowDown,
    FocusLogs,
    ClearSelection,
    ForcePoll,
    IntervalUp,
    IntervalDown,
    ScrollUp,
    ScrollDown,
}

/// Decode a key event under the given focus. Unmapped keys are `None`.
pub fn map_key(key: KeyEvent, focus: Focus) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Exit);
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Exit),
        KeyCode::Left => Some(Action::SelectPrev),
        KeyCode::Right => Some(Action::SelectNext),
        KeyCode::Up => match focus {
            Focus::Grid => Some(Action::SelectRowUp),
            Focus::Logs => Some(Action::ScrollUp),
        },
        KeyCode::Down => match focus {
            Focus::Grid => Some(Action::SelectRowDown),
            Focus::Logs => Some(Action::ScrollDown),
        },
        KeyCode::Enter => Some(Action::FocusLogs),
        KeyCode::Esc => Some(Action::ClearSelection),
        KeyCode::Char('r') => Some(Action::ForcePoll),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::IntervalUp),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Action::IntervalDown),
        _ => None,
    }
}

/// Fleet-order selection stepping for `←`/`→`: wraps at both ends.
/// `None` starts at the first (next) or last (prev) agent.
pub fn step_selection(ids: &[String], current: Option<&str>, forward: bool) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    let index = current.and_then(|id| ids.iter().position(|x| x == id));
    let next = match (index, forward) {
        (None, true) => 0,
        (None, false) => ids.len() - 1,
        (Some(i), true) => (i + 1) % ids.len(),
        (Some(i), false) => (i + ids.len() - 1) % ids.len(),
    };
    Some(ids[next].clone())
}

/// Row-wise selection stepping for `↑`/`↓`: moves one grid row
/// (`cols` slots), bounded — no wrap past the fleet edges.
pub fn step_selection_row(
    ids: &[String],
    current: Option<&str>,
    cols: usize,
    down: bool,
) -> Option<String> {
    if ids.is_empty() || cols == 0 {
        return None;
    }
    let Some(index) = current.and_then(|id| ids.iter().position(|x| x == id)) else {
        return Some(ids[0].clone());
    };
    let target = if down { index + cols } else { index.checked_sub(cols)? };
    if target >= ids.len() {
        return None;
    }
    Some(ids[target].clone())
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;
