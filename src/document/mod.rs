//! Markdown document model.
//!
//! This module handles:
//! - Parsing markdown with comrak into an ordered block sequence
//! - Per-block render state for diagrams and images
//! - Section structure (which blocks a heading owns)

mod parser;
mod types;

pub use parser::parse;
pub use types::{Block, BlockId, BlockKind, Document, RenderState};

use std::path::Path;

use anyhow::{Context, Result};

/// Read and parse a markdown file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn load_file(path: &Path) -> Result<Document> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse(&source).with_path(path))
}

/// Whether a link target points at another markdown document.
pub fn is_markdown_link(target: &str) -> bool {
    let path = target.split('#').next().unwrap_or_default();
    if path.is_empty() || target.contains("://") || target.starts_with("mailto:") {
        return false;
    }
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
}

/// Whether a link target should be handed to the system opener.
pub fn is_external_link(target: &str) -> bool {
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| target.starts_with(scheme))
}
