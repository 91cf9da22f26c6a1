// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ratatui::layout::Rect;
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use asf_telemetry::schema::{LogLevel, LogRow};

use crate::format::format_clock;

/// Scroll state for the whisper log pane.
///
/// Auto-scroll pins the view to the newest entry. A user scrolling up
/// unpins it; scrolling back to the bottom pins it again.
#[derive(Debug, Clone, Copy)]
pub struct LogView {
    /// First visible line when unpinned.
    offset: usize,
    auto_scroll: bool,
}

impl Default for LogView {
    fn default() -> Self {
        Self { offset: 0, auto_scroll: true }
    }
}

impl LogView {
    /// Whether the view is pinned to the bottom.
    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    /// Scroll one line towards older entries; unpins auto-scroll.
    pub fn scroll_up(&mut self, total_lines: usize, viewport: usize) {
        let bottom = bottom_offset(total_lines, viewport);
        if self.auto_scroll {
            self.offset = bottom;
            self.auto_scroll = false;
        }
        self.offset = self.offset.saturating_sub(1);
    }

    /// Scroll one line towards newer entries; re-pins at the bottom.
    pub fn scroll_down(&mut self, total_lines: usize, viewport: usize) {
        let bottom = bottom_offset(total_lines, viewport);
        self.offset = (self.offset + 1).min(bottom);
        if self.offset == bottom {
            self.auto_scroll = true;
        }
    }

    /// Offset to draw from for the given content and viewport size.
    pub fn draw_offset(&self, total_lines: usize, viewport: usize) -> usize {
        if self.auto_scroll {
            bottom_offset(total_lines, viewport)
        } else {
            self.offset.min(bottom_offset(total_lines, viewport))
        }
    }

    /// Back to the pinned default (selection changed).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn bottom_offset(total_lines: usize, viewport: usize) -> usize {
    total_lines.saturating_sub(viewport.max(1))
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::Gray,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Error => Color::Red,
    }
}

/// One log line: `[HH:MM:SS] message`.
pub fn log_line(entry: &LogRow) -> String {
    format!("[{}] {}", format_clock(entry.timestamp), entry.message)
}

/// The whisper log pane on the right half.
///
/// `entries` arrive newest-first from the adapter and render
/// oldest-first so the bottom is the newest line.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    selected: Option<&str>,
    entries: &[LogRow],
    view: &LogView,
) {
    let title = match selected {
        Some(id) => format!("Whisper Log — {id}"),
        None => "Whisper Log".to_owned(),
    };
    let block = Block::bordered().title(title);

    let Some(_id) = selected else {
        let hint =
            Paragraph::new(Line::from("Select an agent to view logs").style(Style::new().dim()))
                .block(block);
        frame.render_widget(hint, area);
        return;
    };

    if entries.is_empty() {
        let hint = Paragraph::new(Line::from("No logs for this agent").style(Style::new().dim()))
            .block(block);
        frame.render_widget(hint, area);
        return;
    }

    let lines: Vec<Line> = entries
        .iter()
        .rev()
        .map(|e| Line::from(log_line(e)).style(Style::new().fg(level_color(e.level))))
        .collect();
    let viewport = area.height.saturating_sub(2) as usize;
    let offset = view.draw_offset(lines.len(), viewport) as u16;
    frame.render_widget(Paragraph::new(lines).block(block).scroll((offset, 0)), area);
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
