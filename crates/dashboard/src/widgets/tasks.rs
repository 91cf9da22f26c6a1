// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ratatui::layout::Rect;
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use asf_telemetry::schema::{TaskRow, TaskStatus};

use crate::format::{progress_bar, truncate_title};

/// Title width before truncation.
const TITLE_WIDTH: usize = 20;
/// Progress bar cell count.
const BAR_WIDTH: usize = 10;

/// Queue order: status priority (InProgress, Pending, Complete,
/// Failed), newest first within a status.
pub fn sort_tasks(tasks: &mut [TaskRow]) {
    tasks.sort_by(|a, b| {
        a.status
            .priority()
            .cmp(&b.status.priority())
            .then(b.created_at.cmp(&a.created_at))
    });
}

/// One queue row: `[<bar>] PPP% TITLE`.
pub fn task_line(task: &TaskRow) -> String {
    format!(
        "[{}] {:>3}% {}",
        progress_bar(task.progress_percent, BAR_WIDTH),
        task.progress_percent.min(100),
        truncate_title(&task.title, TITLE_WIDTH),
    )
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::InProgress => Color::Green,
        TaskStatus::Pending => Color::White,
        TaskStatus::Complete => Color::DarkGray,
        TaskStatus::Failed => Color::Red,
    }
}

/// Scrollable task queue on the lower-left. `tasks` must already be
/// in queue order.
pub fn render(frame: &mut Frame, area: Rect, tasks: &[TaskRow], scroll: u16) {
    let block = Block::bordered().title("Tasks");
    if tasks.is_empty() {
        let empty = Paragraph::new(Line::from("No tasks").style(Style::new().dim())).block(block);
        frame.render_widget(empty, area);
        return;
    }

    let lines: Vec<Line> = tasks
        .iter()
        .map(|t| Line::from(task_line(t)).style(Style::new().fg(status_color(t.status))))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
