use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

use crate::app::{Message, Model};

const WHEEL_STEP: usize = 3;

pub(super) fn handle_event(event: &Event, model: &Model) -> Option<Message> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => handle_key(*key, model),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollDown => Some(Message::ScrollDown(WHEEL_STEP)),
            MouseEventKind::ScrollUp => Some(Message::ScrollUp(WHEEL_STEP)),
            _ => None,
        },
        Event::Resize(width, height) => Some(Message::Resize(*width, *height)),
        _ => None,
    }
}

pub(super) fn handle_key(key: KeyEvent, model: &Model) -> Option<Message> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Message::Quit);
    }

    if model.help_visible {
        return Some(Message::HideHelp);
    }

    if let Some(query) = model.search_input.as_ref() {
        return match key.code {
            KeyCode::Esc => Some(Message::ClearSearch),
            KeyCode::Enter => Some(Message::SubmitSearch),
            KeyCode::Backspace => {
                let mut next = query.clone();
                next.pop();
                Some(Message::SearchInput(next))
            }
            KeyCode::Char(c)
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT) =>
            {
                let mut next = query.clone();
                next.push(c);
                Some(Message::SearchInput(next))
            }
            _ => None,
        };
    }

    let on_heading = model
        .cursor_block()
        .is_some_and(|b| b.kind().heading_level().is_some());

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(Message::CursorNext),
        KeyCode::Char('k') | KeyCode::Up => Some(Message::CursorPrev),
        KeyCode::Char(' ') if on_heading => Some(Message::ToggleSection),
        KeyCode::Char(' ') | KeyCode::PageDown => {
            model.viewport.can_scroll_down().then_some(Message::PageDown)
        }
        KeyCode::PageUp => model.viewport.can_scroll_up().then_some(Message::PageUp),
        KeyCode::Char('g') | KeyCode::Home => Some(Message::GoToTop),
        KeyCode::Char('G') | KeyCode::End => Some(Message::GoToBottom),
        KeyCode::Enter => Some(Message::Activate),
        KeyCode::Tab => Some(Message::ToggleSection),

        KeyCode::Char('/') => Some(Message::StartSearch),
        KeyCode::Char('n') => Some(Message::NextMatch),
        KeyCode::Char('N') => Some(Message::PrevMatch),
        KeyCode::Esc if model.session.search().is_active() => Some(Message::ClearSearch),

        KeyCode::Char('b') | KeyCode::Backspace => Some(Message::Back),
        KeyCode::Char('f') => Some(Message::Forward),
        KeyCode::Char('r') => Some(Message::Reload),
        KeyCode::Char('w') => Some(Message::ToggleWatch),
        KeyCode::Char('s') => Some(Message::CycleStyle),
        KeyCode::Char('?') | KeyCode::F(1) => Some(Message::ToggleHelp),
        KeyCode::Char('q') => Some(Message::Quit),
        _ => None,
    }
}
