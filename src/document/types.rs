//! Core document types.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::ArtifactRef;

/// Stable identifier of a block: its position in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a block is, as far as rendering and sectioning care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// Heading with its level (1-6)
    Heading(u8),
    /// Paragraphs, lists, quotes, rules
    Text,
    /// Block quote opened with a `[!KIND]` marker
    Callout(String),
    /// Fenced or indented code that is not a diagram
    Code(Option<String>),
    /// GFM table
    Table,
    /// Mermaid diagram fence
    Diagram,
    /// Standalone image
    Image,
}

impl BlockKind {
    /// Whether the block needs the render pipeline before it can be shown.
    pub const fn is_renderable(&self) -> bool {
        matches!(self, Self::Diagram | Self::Image)
    }

    pub const fn heading_level(&self) -> Option<u8> {
        match self {
            Self::Heading(level) => Some(*level),
            _ => None,
        }
    }
}

/// Render progress of a block.
///
/// Transitions only move forward within one load:
/// `Pending -> Rendering -> Ready | Error`. `Inline` blocks never enter the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    Inline,
    Pending,
    Rendering,
    Ready(ArtifactRef),
    Error(String),
}

impl RenderState {
    const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Rendering => 1,
            Self::Inline | Self::Ready(_) | Self::Error(_) => 2,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Displayable blocks contribute their text to search.
    pub const fn is_displayable(&self) -> bool {
        matches!(self, Self::Inline | Self::Ready(_))
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Ready(_) => "ready",
            Self::Error(_) => "error",
        }
    }
}

/// One unit of the loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    source: String,
    text: String,
    links: Vec<String>,
    render_state: RenderState,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind, source: String, text: String) -> Self {
        let render_state = if kind.is_renderable() {
            RenderState::Pending
        } else {
            RenderState::Inline
        };
        Self {
            id,
            kind,
            source,
            text,
            links: Vec::new(),
            render_state,
        }
    }

    #[must_use]
    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub const fn kind(&self) -> &BlockKind {
        &self.kind
    }

    /// Raw content: diagram source, image src, or the block's markdown text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Plain rendered text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Link targets in the order they appear.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub const fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    /// Text the search index sees; empty until the block is displayable.
    pub fn searchable_text(&self) -> &str {
        if self.render_state.is_displayable() {
            &self.text
        } else {
            ""
        }
    }

    fn advance(&mut self, next: RenderState) -> bool {
        if self.render_state.is_terminal() || next.rank() <= self.render_state.rank() {
            tracing::debug!(
                block = %self.id,
                from = self.render_state.label(),
                to = next.label(),
                "ignoring backward render transition"
            );
            return false;
        }
        self.render_state = next;
        true
    }
}

/// A parsed document: an ordered block sequence plus where it came from.
#[derive(Debug, Clone, Default)]
pub struct Document {
    path: Option<PathBuf>,
    blocks: Vec<Block>,
}

impl Document {
    /// Create an empty document.
    pub const fn empty() -> Self {
        Self {
            path: None,
            blocks: Vec::new(),
        }
    }

    pub(crate) const fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { path: None, blocks }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Directory relative image sources resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Move a block's render state forward. Returns false for unknown ids and
    /// for transitions that would go backward.
    pub fn advance(&mut self, id: BlockId, next: RenderState) -> bool {
        self.blocks
            .get_mut(id.0)
            .is_some_and(|block| block.advance(next))
    }

    /// Blocks owned by the heading `id`: everything after it up to the next
    /// heading of the same or a higher level.
    pub fn section_body(&self, id: BlockId) -> std::ops::Range<usize> {
        let Some(level) = self.block(id).and_then(|b| b.kind().heading_level()) else {
            return 0..0;
        };
        let start = id.0 + 1;
        let end = self.blocks[start..]
            .iter()
            .position(|b| b.kind().heading_level().is_some_and(|l| l <= level))
            .map_or(self.blocks.len(), |offset| start + offset);
        start..end
    }

    /// Headings whose sections contain `id`, innermost first.
    pub fn enclosing_headings(&self, id: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut ceiling = u8::MAX;
        for block in self.blocks[..id.0.min(self.blocks.len())].iter().rev() {
            if let Some(level) = block.kind().heading_level()
                && level < ceiling
            {
                out.push(block.id());
                ceiling = level;
                if level == 1 {
                    break;
                }
            }
        }
        out
    }

    pub fn renderable_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.kind().is_renderable())
    }
}
