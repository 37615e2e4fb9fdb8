//! The viewer's state machine.
//!
//! A [`SessionController`] owns the loaded document and everything derived
//! from it: render progress, search, navigation history and collapsed
//! sections. The presentation layer drives it and reads it back; nothing
//! here draws.

mod history;
mod sections;

pub use history::{NavigationHistory, Visit};
pub use sections::SectionState;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::document::{self, Block, BlockId, BlockKind, Document, RenderState};
use crate::render::{
    Delivery, DeliveryUpdate, RenderCoordinator, RenderFormat, RenderJob, TaskState,
};
use crate::search::{Match, SearchEngine};

/// What the session renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub render_images: bool,
    pub render_diagrams: bool,
    pub diagram_format: RenderFormat,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            render_images: true,
            render_diagrams: true,
            diagram_format: RenderFormat::Png,
        }
    }
}

pub struct SessionController {
    coordinator: RenderCoordinator,
    options: SessionOptions,
    document: Document,
    history: NavigationHistory,
    sections: SectionState,
    search: SearchEngine,
}

impl SessionController {
    pub fn new(coordinator: RenderCoordinator, options: SessionOptions) -> Self {
        Self {
            coordinator,
            options,
            document: Document::empty(),
            history: NavigationHistory::new(),
            sections: SectionState::new(),
            search: SearchEngine::new(),
        }
    }

    // --- Loading ---

    /// Open `path` as a new navigation step. Opening the current document
    /// again does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read; history is untouched then.
    pub fn open(&mut self, path: &Path) -> Result<Visit> {
        let path = canonical(path);
        if self.history.current() == Some(path.as_path()) {
            return Ok(Visit::NoOp);
        }
        let doc = document::load_file(&path)?;
        let visit = self.history.visit(path);
        self.install(doc);
        Ok(visit)
    }

    /// Reopen the previous document. Returns the path now showing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read; history is restored then.
    pub fn back(&mut self) -> Result<Option<PathBuf>> {
        let Some(target) = self.history.back() else {
            return Ok(None);
        };
        match document::load_file(&target) {
            Ok(doc) => {
                self.install(doc);
                Ok(Some(target))
            }
            Err(err) => {
                self.history.forward();
                Err(err)
            }
        }
    }

    /// Reopen the document left by the last [`Self::back`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read; history is restored then.
    pub fn forward(&mut self) -> Result<Option<PathBuf>> {
        let Some(target) = self.history.forward() else {
            return Ok(None);
        };
        match document::load_file(&target) {
            Ok(doc) => {
                self.install(doc);
                Ok(Some(target))
            }
            Err(err) => {
                self.history.back();
                Err(err)
            }
        }
    }

    /// Re-read the current document from disk. Blocks that failed get
    /// another chance. Returns false when there is no file to reload.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn reload(&mut self) -> Result<bool> {
        let Some(path) = self.document.path().map(Path::to_path_buf) else {
            return Ok(false);
        };
        let doc = document::load_file(&path)
            .with_context(|| format!("Failed to reload {}", path.display()))?;
        self.install(doc);
        Ok(true)
    }

    /// Install an already-parsed document, recording a visit when it has a
    /// path.
    pub fn load(&mut self, doc: Document) {
        if let Some(path) = doc.path() {
            self.history.visit(canonical(path));
        }
        self.install(doc);
    }

    fn install(&mut self, doc: Document) {
        self.coordinator.abandon_waiters();
        self.sections.clear();
        self.document = doc;
        info!(
            path = ?self.document.path(),
            blocks = self.document.len(),
            "document loaded"
        );

        let requests: Vec<(BlockId, Option<RenderJob>)> = self
            .document
            .renderable_blocks()
            .map(|block| (block.id(), self.job_for(block)))
            .collect();
        for (id, job) in requests {
            let Some(job) = job else {
                self.document
                    .advance(id, RenderState::Error("rendering disabled".to_string()));
                continue;
            };
            let key = self.coordinator.request(id, &job);
            if self.coordinator.task_state(&key) == Some(TaskState::InFlight) {
                self.document.advance(id, RenderState::Rendering);
            }
        }

        if self.search.is_active() {
            let query = self.search.query().to_string();
            self.search.set_query(&self.document, &query);
        } else {
            self.search.clear();
        }
    }

    fn job_for(&self, block: &Block) -> Option<RenderJob> {
        match block.kind() {
            BlockKind::Diagram if self.options.render_diagrams => Some(RenderJob::diagram(
                block.source(),
                self.options.diagram_format,
            )),
            BlockKind::Image if self.options.render_images => {
                Some(RenderJob::image(self.resolve_image(block.source())))
            }
            _ => None,
        }
    }

    /// Absolute path or URL for an image source.
    fn resolve_image(&self, source: &str) -> String {
        if document::is_external_link(source) {
            return source.to_string();
        }
        let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
        if path.is_absolute() {
            return path.to_string_lossy().to_string();
        }
        self.document
            .base_dir()
            .join(path)
            .to_string_lossy()
            .to_string()
    }

    /// Local markdown file a link target points at, if any.
    pub fn resolve_link(&self, target: &str) -> Option<PathBuf> {
        if !document::is_markdown_link(target) {
            return None;
        }
        let path = target.split('#').next().unwrap_or(target);
        let path = Path::new(path);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.document.base_dir().join(path)
        })
    }

    // --- Deliveries ---

    /// Apply every delivery that has arrived. Returns how many block
    /// transitions took effect.
    pub fn pump(&mut self) -> usize {
        let deliveries = self.coordinator.poll();
        self.apply_all(deliveries)
    }

    /// Like [`Self::pump`], but waits up to `timeout` for the first delivery.
    pub fn wait_for_deliveries(&mut self, timeout: Duration) -> usize {
        let Some(first) = self.coordinator.wait(timeout) else {
            return 0;
        };
        let mut deliveries = vec![first];
        deliveries.extend(self.coordinator.poll());
        self.apply_all(deliveries)
    }

    fn apply_all(&mut self, deliveries: Vec<Delivery>) -> usize {
        let mut applied = 0;
        let mut became_ready = false;
        for delivery in deliveries {
            let state = match delivery.update {
                DeliveryUpdate::Started => RenderState::Rendering,
                DeliveryUpdate::Ready(artifact) => RenderState::Ready(artifact),
                DeliveryUpdate::Failed(err) => RenderState::Error(err.to_string()),
            };
            let ready = matches!(state, RenderState::Ready(_));
            for id in delivery.blocks {
                if self.document.advance(id, state.clone()) {
                    applied += 1;
                    became_ready |= ready;
                }
            }
            debug!(key = %delivery.key, state = state.label(), "delivery applied");
        }
        if became_ready && self.search.is_active() {
            self.search.refresh(&self.document);
        }
        applied
    }

    /// Blocks still waiting on the render pipeline.
    pub fn pending_renders(&self) -> usize {
        self.document
            .blocks()
            .iter()
            .filter(|b| !b.render_state().is_terminal())
            .count()
    }

    // --- Search ---

    pub fn set_query(&mut self, query: &str) -> usize {
        self.search.set_query(&self.document, query)
    }

    pub fn next_match(&mut self) -> Option<Match> {
        let found = self.search.next()?;
        self.ensure_visible(found.block);
        Some(found)
    }

    pub fn previous_match(&mut self) -> Option<Match> {
        let found = self.search.previous()?;
        self.ensure_visible(found.block);
        Some(found)
    }

    pub fn clear_search(&mut self) {
        self.search.clear();
    }

    /// Expand every collapsed heading that hides `id`.
    pub fn ensure_visible(&mut self, id: BlockId) {
        for heading in self.document.enclosing_headings(id) {
            if self.sections.expand(heading) {
                debug!(%heading, block = %id, "expanded section to reveal block");
            }
        }
    }

    // --- Sections ---

    /// Toggle a heading's section. Returns the new collapsed value, or None
    /// when `id` is not a heading.
    pub fn toggle_section(&mut self, id: BlockId) -> Option<bool> {
        self.document
            .block(id)
            .and_then(|b| b.kind().heading_level())?;
        Some(self.sections.toggle(id))
    }

    pub fn is_collapsed(&self, id: BlockId) -> bool {
        self.sections.is_collapsed(id)
    }

    /// Blocks not hidden by a collapsed heading. A collapsed heading itself
    /// stays visible.
    pub fn visible_blocks(&self) -> Vec<&Block> {
        let mut out = Vec::with_capacity(self.document.len());
        let mut hidden_under: Option<u8> = None;
        for block in self.document.blocks() {
            let level = block.kind().heading_level();
            if let Some(ceiling) = hidden_under {
                if level.is_some_and(|l| l <= ceiling) {
                    hidden_under = None;
                } else {
                    continue;
                }
            }
            out.push(block);
            if let Some(level) = level
                && self.sections.is_collapsed(block.id())
            {
                hidden_under = Some(level);
            }
        }
        out
    }

    // --- Observation ---

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub fn blocks(&self) -> &[Block] {
        self.document.blocks()
    }

    pub const fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub const fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub const fn sections(&self) -> &SectionState {
        &self.sections
    }

    pub const fn coordinator(&self) -> &RenderCoordinator {
        &self.coordinator
    }

    pub const fn options(&self) -> SessionOptions {
        self.options
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
