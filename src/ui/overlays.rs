use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph};

use crate::app::Model;

const KEYS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j/k or Up/Down", "Next / previous block"),
            ("Space/PageDown", "Page down (Space on a heading folds it)"),
            ("PageUp", "Page up"),
            ("g / G", "Top / bottom"),
            ("Enter", "Fold heading or follow the block's link"),
            ("Tab", "Fold heading"),
        ],
    ),
    (
        "Search",
        &[
            ("/", "Start search"),
            ("Enter", "Jump to first match"),
            ("n / N", "Next / previous match"),
            ("Esc", "Clear search"),
        ],
    ),
    (
        "History",
        &[
            ("b / Backspace", "Back"),
            ("f", "Forward"),
        ],
    ),
    (
        "Other",
        &[
            ("r", "Reload file"),
            ("w", "Toggle watch"),
            ("s", "Cycle style"),
            ("q / Ctrl-c", "Quit"),
            ("?", "Toggle help"),
        ],
    ),
];

pub fn render_help_overlay(model: &Model, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(12).max(48);
    let popup_height = area.height.saturating_sub(6).max(12);
    let popup = centered_popup_rect(popup_width, popup_height, area);

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let dim_style = Style::default().fg(Color::Indexed(245));

    let mut lines: Vec<Line> = Vec::new();
    for (section, keys) in KEYS {
        lines.push(Line::styled(*section, section_style));
        for (key, action) in *keys {
            lines.push(Line::raw(format!("  {key:<20}{action}")));
        }
        lines.push(Line::raw(""));
    }

    let show = |path: Option<&std::path::Path>| {
        path.map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
    };
    lines.push(Line::styled("Config", section_style));
    lines.push(Line::raw(format!(
        "  Global: {}",
        show(model.config_global_path.as_deref())
    )));
    lines.push(Line::raw(format!(
        "  Local override: {}",
        show(model.config_local_path.as_deref())
    )));
    lines.push(Line::raw(format!(
        "  Cache: {}",
        model.session.coordinator().cache().root().display()
    )));
    lines.push(Line::raw(""));
    lines.push(Line::styled("any key closes", dim_style));

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

fn centered_popup_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w) / 2);
    let y = area.y + (area.height.saturating_sub(h) / 2);
    Rect::new(x, y, w, h)
}
