//! Terminal UI components.
//!
//! - [`layout`]: visible blocks to styled rows
//! - [`viewport`]: scroll position over those rows
//! - [`style`]: named styles and their palettes

pub mod layout;
pub mod style;
pub mod viewport;

mod overlays;
mod status;

pub use layout::{ArtifactSizes, LaidLine, layout};
pub use style::{Palette, Style};

use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph};

use crate::app::Model;

/// Rows taken by the status bar.
pub const STATUS_ROWS: u16 = 1;

/// Render the complete UI.
pub fn render(model: &Model, frame: &mut Frame) {
    let area = frame.area();
    let search_active = model.search_input.is_some();
    let toast_active = model.active_toast().is_some();
    let footer_rows = STATUS_ROWS + u16::from(search_active) + u16::from(toast_active);

    let doc_area = Rect {
        height: area.height.saturating_sub(footer_rows),
        ..area
    };
    render_document(model, frame, doc_area);

    // Footer rows from the top: toast, search bar, status bar.
    let mut y = area.y + area.height.saturating_sub(footer_rows);
    let mut next_row = || {
        let row = Rect {
            y,
            height: 1,
            ..area
        };
        y += 1;
        row
    };
    if toast_active {
        status::render_toast_bar(model, frame, next_row());
    }
    if search_active {
        status::render_search_bar(model, frame, next_row());
    }
    status::render_status_bar(model, frame, next_row());

    if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    }
}

fn render_document(model: &Model, frame: &mut Frame, area: Rect) {
    let palette = model.style.palette();
    let marker = format!("{} ", palette.cursor);
    let content: Vec<Line> = model.lines[model.viewport.visible_range()]
        .iter()
        .take(area.height as usize)
        .map(|laid| {
            let gutter = if laid.first && model.cursor == Some(laid.block) {
                Span::styled(marker.clone(), palette.quote)
            } else {
                Span::raw("  ")
            };
            let mut spans = Vec::with_capacity(laid.line.spans.len() + 1);
            spans.push(gutter);
            spans.extend(laid.line.spans.iter().cloned());
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(content).style(palette.text), area);
}

#[cfg(test)]
mod tests;
