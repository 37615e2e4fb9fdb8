//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: State transitions that stay in memory
//! - [`App::run`]: Main event loop with rendering and side effects

mod effects;
mod event_loop;
mod input;
mod model;
mod update;

pub use model::{Model, ToastLevel};
pub use update::{Message, update};

use std::path::PathBuf;

use crate::session::SessionController;
use crate::ui::Style;

/// Owns the session until [`App::run`] hands it to the event loop.
pub struct App {
    session: SessionController,
    file_path: Option<PathBuf>,
    watch_enabled: bool,
    style: Style,
    config_global_path: Option<PathBuf>,
    config_local_path: Option<PathBuf>,
}

impl App {
    pub fn new(session: SessionController) -> Self {
        Self {
            session,
            file_path: None,
            watch_enabled: false,
            style: Style::default(),
            config_global_path: None,
            config_local_path: None,
        }
    }

    /// Document to open on start.
    #[must_use]
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    /// Enable or disable file watching.
    #[must_use]
    pub const fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Set config paths to show in help.
    #[must_use]
    pub fn with_config_paths(
        mut self,
        global_path: Option<PathBuf>,
        local_path: Option<PathBuf>,
    ) -> Self {
        self.config_global_path = global_path;
        self.config_local_path = local_path;
        self
    }
}
