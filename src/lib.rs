// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. cache::CacheStore)
    clippy::module_name_repetitions
)]

//! # Flint
//!
//! A terminal markdown viewer whose diagrams and images go through a
//! cached, asynchronous render pipeline.
//!
//! - Mermaid diagrams are rendered remotely and images decoded locally, on
//!   worker threads, at most once per distinct input
//! - Artifacts persist in a content-addressed cache shared across runs
//! - Back/forward history, incremental search and collapsible sections
//! - File watching for live preview
//!
//! ## Architecture
//!
//! The render/cache pipeline ([`cache`], [`render`]) feeds a session state
//! machine ([`session`]) that owns the loaded [`document`]. The terminal
//! front end follows The Elm Architecture (TEA):
//! - **Model**: Application state
//! - **Message**: Events and actions
//! - **Update**: In-memory state transitions
//! - **View**: Render to terminal
//!
//! ## Modules
//!
//! - [`app`]: Main application loop and state
//! - [`cache`]: Content-addressed artifact store
//! - [`config`]: Layered flag configuration
//! - [`document`]: Markdown to blocks
//! - [`render`]: Renderers and the render coordinator
//! - [`search`]: Incremental search
//! - [`session`]: History, sections and the session controller
//! - [`ui`]: Terminal UI components
//! - [`watcher`]: File watching

pub mod app;
pub mod cache;
pub mod config;
pub mod document;
pub mod render;
pub mod search;
pub mod session;
pub mod ui;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::cache::{CacheKey, CacheStore};
    pub use crate::document::{Block, BlockId, Document, RenderState};
    pub use crate::render::{RenderCoordinator, Renderers};
    pub use crate::session::{SessionController, SessionOptions};
}
