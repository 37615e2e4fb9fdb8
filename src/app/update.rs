use crate::app::{Model, ToastLevel};

/// All possible events and actions in the application.
///
/// These represent user input, system events, and internal actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Navigation
    /// Scroll up by n rows
    ScrollUp(usize),
    /// Scroll down by n rows
    ScrollDown(usize),
    PageUp,
    PageDown,
    GoToTop,
    GoToBottom,
    /// Move the cursor to the next visible block
    CursorNext,
    /// Move the cursor to the previous visible block
    CursorPrev,
    /// Fold the cursor's heading, or follow the cursor block's first link
    Activate,
    /// Fold or unfold the heading under the cursor
    ToggleSection,

    // Search
    /// Open the search bar
    StartSearch,
    /// Update the query being typed
    SearchInput(String),
    /// Close the search bar and jump to the first match
    SubmitSearch,
    NextMatch,
    PrevMatch,
    ClearSearch,

    // Documents
    Back,
    Forward,
    /// Force reload file
    Reload,
    /// File changed externally, reload
    FileChanged,
    /// Render deliveries changed block states
    RendersProgressed,
    /// Toggle file watching
    ToggleWatch,

    // Window
    CycleStyle,
    ToggleHelp,
    HideHelp,
    /// Terminal resized
    Resize(u16, u16),
    Quit,
}

/// Apply a message to the model, producing the next model.
///
/// Anything that touches the filesystem or the outside world (loading
/// documents, following links, the watcher) happens afterwards in the side
/// effect pass; here the model only changes in memory.
pub fn update(mut model: Model, msg: Message) -> Model {
    match msg {
        Message::ScrollUp(n) => model.viewport.scroll_up(n),
        Message::ScrollDown(n) => model.viewport.scroll_down(n),
        Message::PageUp => model.viewport.page_up(),
        Message::PageDown => model.viewport.page_down(),
        Message::GoToTop => {
            model.viewport.go_to_top();
            model.cursor = model.lines.first().map(|l| l.block);
        }
        Message::GoToBottom => {
            model.viewport.go_to_bottom();
            model.cursor = model.lines.iter().rev().find(|l| l.first).map(|l| l.block);
        }
        Message::CursorNext => {
            if model.step_cursor(true) {
                model.reveal_cursor();
            } else {
                model.viewport.scroll_down(1);
            }
        }
        Message::CursorPrev => {
            if model.step_cursor(false) {
                model.reveal_cursor();
            } else {
                model.viewport.scroll_up(1);
            }
        }
        Message::Activate | Message::ToggleSection => toggle_cursor_section(&mut model),

        Message::StartSearch => {
            model.search_input = Some(model.session.search().query().to_string());
        }
        Message::SearchInput(query) => {
            model.session.set_query(&query);
            model.search_input = Some(query);
            model.relayout();
        }
        Message::SubmitSearch => {
            model.search_input = None;
            if model.session.search().is_active() {
                jump_to_match(&mut model, true);
            } else {
                model.session.clear_search();
                model.relayout();
            }
        }
        Message::NextMatch => jump_to_match(&mut model, true),
        Message::PrevMatch => jump_to_match(&mut model, false),
        Message::ClearSearch => {
            model.search_input = None;
            model.session.clear_search();
            model.relayout();
        }

        Message::RendersProgressed => model.relayout(),
        Message::ToggleWatch => model.watch_enabled = !model.watch_enabled,
        Message::Back | Message::Forward | Message::Reload | Message::FileChanged => {}

        Message::CycleStyle => {
            model.style = model.style.next();
            model.relayout();
            let name = model.style.name();
            model.show_toast(ToastLevel::Info, format!("Style: {name}"));
        }
        Message::ToggleHelp => model.help_visible = !model.help_visible,
        Message::HideHelp => model.help_visible = false,
        Message::Resize(width, height) => {
            model.resize(width, height);
            model.reveal_cursor();
        }
        Message::Quit => model.should_quit = true,
    }
    model
}

fn toggle_cursor_section(model: &mut Model) {
    let Some(id) = model.cursor else {
        return;
    };
    if model.session.toggle_section(id).is_some() {
        model.relayout();
        model.reveal_cursor();
    }
}

fn jump_to_match(model: &mut Model, forward: bool) {
    let found = if forward {
        model.session.next_match()
    } else {
        model.session.previous_match()
    };
    // Sections may have been expanded to show the match.
    model.relayout();
    match found {
        Some(found) => model.focus(found.block),
        None if model.session.search().is_active() => {
            let query = model.session.search().query().to_string();
            model.show_toast(ToastLevel::Warning, format!("No matches for \"{query}\""));
        }
        None => {}
    }
}
