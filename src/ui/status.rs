use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Model, ToastLevel};

pub fn render_search_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let query = model.search_input.as_deref().unwrap_or_default();
    let match_info = if query.trim().is_empty() {
        String::new()
    } else {
        match model.session.search().matches().len() {
            0 => "  [no matches]".to_string(),
            1 => "  [1 match]".to_string(),
            n => format!("  [{n} matches]"),
        }
    };
    let text = format!("/{query}{match_info}  Enter: jump  Esc: clear");
    let bar = Paragraph::new(text).style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(bar, area);
}

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let bar = Paragraph::new(status_text(model))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(bar, area);
}

pub(super) fn status_text(model: &Model) -> String {
    let session = &model.session;
    let filename = session
        .document()
        .path()
        .and_then(|p| p.file_name())
        .map_or_else(|| "untitled".to_string(), |s| s.to_string_lossy().to_string());

    let history = session.history();
    let mut status = format!(
        " {}  [{}%]  \u{25c0}{} \u{25b6}{}",
        filename,
        model.viewport.scroll_percent(),
        history.back_depth(),
        history.forward_depth()
    );

    let pending = session.pending_renders();
    if pending > 0 {
        status.push_str(&format!("  [rendering {pending}]"));
    }
    let search = session.search();
    if search.is_active() && model.search_input.is_none() {
        match search.position() {
            Some((current, total)) => {
                status.push_str(&format!("  /{} [{current}/{total}]", search.query()));
            }
            None => {
                status.push_str(&format!(
                    "  /{} [{}]",
                    search.query(),
                    search.matches().len()
                ));
            }
        }
    }
    status.push_str(&format!("  {}", model.style.name()));
    if model.watch_enabled {
        status.push_str(" [watching]");
    }
    status.push_str("  ?:help");
    status
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        ToastLevel::Info => (
            "[info]",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
        ToastLevel::Warning => (
            "[warn]",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        ToastLevel::Error => ("[error]", Style::default().bg(Color::Red).fg(Color::White)),
    };
    let toast = Paragraph::new(format!("{prefix} {message}")).style(style);
    frame.render_widget(toast, area);
}
