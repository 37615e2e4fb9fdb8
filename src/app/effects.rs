use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::{Message, Model, ToastLevel};
use crate::document;
use crate::session::Visit;
use crate::watcher::DocumentWatcher;

const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

pub(super) fn make_watcher(path: Option<&Path>) -> notify::Result<DocumentWatcher> {
    let mut watcher = DocumentWatcher::new(WATCH_DEBOUNCE)?;
    if let Some(path) = path {
        watcher.follow(path)?;
    }
    Ok(watcher)
}

/// Run the side effects of a message that `update` has already applied.
pub(super) fn handle_message_side_effects(
    model: &mut Model,
    watcher: &mut Option<DocumentWatcher>,
    msg: &Message,
) {
    match msg {
        Message::ToggleWatch => {
            if model.watch_enabled {
                match make_watcher(model.session.document().path()) {
                    Ok(created) => {
                        *watcher = Some(created);
                        model.show_toast(ToastLevel::Info, "Watching file changes");
                    }
                    Err(err) => {
                        model.watch_enabled = false;
                        *watcher = None;
                        warn!(%err, "file watcher unavailable");
                        model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {err}"));
                    }
                }
            } else {
                *watcher = None;
                model.show_toast(ToastLevel::Info, "Watch disabled");
            }
        }
        Message::Reload | Message::FileChanged => match model.session.reload() {
            Ok(true) => {
                model.relayout();
                if matches!(msg, Message::Reload) {
                    model.show_toast(ToastLevel::Info, "Reloaded");
                }
            }
            Ok(false) => model.show_toast(ToastLevel::Warning, "Nothing to reload"),
            Err(err) => {
                warn!(err = format!("{err:#}"), "reload failed");
                model.show_toast(ToastLevel::Error, format!("Reload failed: {err:#}"));
            }
        },
        Message::Back | Message::Forward => {
            let (result, word) = if matches!(msg, Message::Back) {
                (model.session.back(), "back")
            } else {
                (model.session.forward(), "forward")
            };
            match result {
                Ok(Some(path)) => {
                    after_navigation(model, watcher);
                    let name = display_name(&path);
                    model.show_toast(ToastLevel::Info, format!("Went {word} to {name}"));
                }
                Ok(None) => model.show_toast(ToastLevel::Info, format!("Nothing to go {word} to")),
                Err(err) => {
                    model.show_toast(ToastLevel::Error, format!("Open failed: {err:#}"));
                }
            }
        }
        Message::Activate => {
            let target = model
                .cursor_block()
                .filter(|b| b.kind().heading_level().is_none())
                .and_then(|b| b.links().first().cloned());
            if let Some(target) = target {
                follow_link(model, watcher, &target);
            }
        }
        _ => {}
    }
}

fn follow_link(model: &mut Model, watcher: &mut Option<DocumentWatcher>, target: &str) {
    if let Some(path) = model.session.resolve_link(target) {
        match model.session.open(&path) {
            Ok(Visit::Moved) => {
                info!(path = %path.display(), "followed link");
                after_navigation(model, watcher);
            }
            Ok(Visit::NoOp) => {}
            Err(err) => model.show_toast(ToastLevel::Error, format!("Open failed: {err:#}")),
        }
    } else if document::is_external_link(target) {
        match open_external_link(target) {
            Ok(()) => model.show_toast(ToastLevel::Info, format!("Opened {target}")),
            Err(err) => model.show_toast(ToastLevel::Error, format!("Open failed: {err}")),
        }
    } else {
        model.show_toast(ToastLevel::Warning, format!("Cannot follow {target}"));
    }
}

/// A different document is showing: reset the view and move the watch.
fn after_navigation(model: &mut Model, watcher: &mut Option<DocumentWatcher>) {
    model.reset_view();
    if let (Some(watcher), Some(path)) = (watcher.as_mut(), model.session.document().path())
        && let Err(err) = watcher.follow(path)
    {
        warn!(path = %path.display(), %err, "cannot watch document");
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

fn open_external_link(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()?
            .wait()?;
        Ok(())
    }
    #[cfg(target_os = "windows")]
    {
        use std::process::Stdio;
        std::process::Command::new("cmd")
            .args(["/C", "start", "", url])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        return Ok(());
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()?
            .wait()?;
        Ok(())
    }
}
