use std::collections::HashSet;
use std::ops::Range;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::CacheKey;
use crate::document::{Block, BlockId, RenderState};
use crate::render::RenderFormat;
use crate::session::SessionController;
use crate::ui::viewport::Viewport;
use crate::ui::{ArtifactSizes, LaidLine, STATUS_ROWS, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// The complete application state.
///
/// All state lives here: the session owns the document side, the model adds
/// what only the terminal needs.
pub struct Model {
    pub session: SessionController,
    pub viewport: Viewport,
    /// Block the cursor marker sits on.
    pub cursor: Option<BlockId>,
    pub style: Style,
    /// Laid-out rows of the visible blocks.
    pub lines: Vec<LaidLine>,
    /// Query being typed; `None` when the search bar is closed.
    pub search_input: Option<String>,
    pub help_visible: bool,
    pub watch_enabled: bool,
    pub should_quit: bool,
    pub config_global_path: Option<PathBuf>,
    pub config_local_path: Option<PathBuf>,
    width: u16,
    artifact_sizes: ArtifactSizes,
    unmeasurable: HashSet<CacheKey>,
    toast: Option<Toast>,
}

impl Model {
    pub fn new(session: SessionController, size: (u16, u16)) -> Self {
        let (width, height) = size;
        let mut model = Self {
            session,
            viewport: Viewport::new(height.saturating_sub(STATUS_ROWS), 0),
            cursor: None,
            style: Style::default(),
            lines: Vec::new(),
            search_input: None,
            help_visible: false,
            watch_enabled: false,
            should_quit: false,
            config_global_path: None,
            config_local_path: None,
            width,
            artifact_sizes: ArtifactSizes::new(),
            unmeasurable: HashSet::new(),
            toast: None,
        };
        model.relayout();
        model
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub(super) fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.viewport.resize(height.saturating_sub(STATUS_ROWS));
        self.relayout();
    }

    /// Rebuild the rows from the session. Call after anything that changes
    /// blocks, render states, sections, search or style.
    pub fn relayout(&mut self) {
        self.measure_artifacts();
        let palette = self.style.palette();
        self.lines = crate::ui::layout(&self.session, &palette, self.width, &self.artifact_sizes);
        self.viewport.set_total_lines(self.lines.len());
        if self.cursor.is_none_or(|id| self.rows_of(id).is_empty()) {
            let first = self.visible_block_ids().next();
            self.cursor = first;
        }
    }

    /// A fresh document was installed: start at the top.
    pub fn reset_view(&mut self) {
        self.cursor = None;
        self.viewport.go_to_top();
        self.relayout();
    }

    /// Pixel sizes for ready PNG artifacts, read from the file header once.
    /// Artifacts whose header cannot be read are not retried.
    fn measure_artifacts(&mut self) {
        for block in self.session.blocks() {
            let RenderState::Ready(artifact) = block.render_state() else {
                continue;
            };
            if artifact.key().format() != RenderFormat::Png
                || self.artifact_sizes.contains_key(artifact.key())
                || self.unmeasurable.contains(artifact.key())
            {
                continue;
            }
            match image::image_dimensions(artifact.path()) {
                Ok(size) => {
                    self.artifact_sizes.insert(*artifact.key(), size);
                }
                Err(err) => {
                    debug!(path = %artifact.path().display(), %err, "artifact size unavailable");
                    self.unmeasurable.insert(*artifact.key());
                }
            }
        }
    }

    #[cfg(test)]
    pub(super) fn is_unmeasurable(&self, key: &CacheKey) -> bool {
        self.unmeasurable.contains(key)
    }

    fn visible_block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.lines.iter().filter(|l| l.first).map(|l| l.block)
    }

    /// Laid-out rows of one block, gap row included.
    pub fn rows_of(&self, id: BlockId) -> Range<usize> {
        let Some(start) = self.lines.iter().position(|l| l.block == id) else {
            return 0..0;
        };
        let len = self.lines[start..]
            .iter()
            .take_while(|l| l.block == id)
            .count();
        start..start + len
    }

    pub fn cursor_block(&self) -> Option<&Block> {
        self.cursor
            .and_then(|id| self.session.document().block(id))
    }

    /// Move the cursor `forward` or back one visible block. Returns false at
    /// either end.
    pub(super) fn step_cursor(&mut self, forward: bool) -> bool {
        let ids: Vec<BlockId> = self.visible_block_ids().collect();
        let Some(current) = self.cursor.and_then(|id| ids.iter().position(|b| *b == id)) else {
            self.cursor = ids.first().copied();
            return self.cursor.is_some();
        };
        let next = if forward {
            current + 1
        } else {
            match current.checked_sub(1) {
                Some(i) => i,
                None => return false,
            }
        };
        match ids.get(next) {
            Some(id) => {
                self.cursor = Some(*id);
                true
            }
            None => false,
        }
    }

    pub(super) fn reveal_cursor(&mut self) {
        if let Some(id) = self.cursor {
            self.viewport.reveal(self.rows_of(id));
        }
    }

    /// Put the cursor on `id` and scroll it into view.
    pub(super) fn focus(&mut self, id: BlockId) {
        self.cursor = Some(id);
        self.reveal_cursor();
    }

    pub(super) fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + Duration::from_secs(4),
        });
    }

    pub(super) fn expire_toast(&mut self, now: Instant) -> bool {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }
}
