//! Turning visible blocks into terminal lines.
//!
//! Layout depends on the document, render states, search matches, the
//! palette and the width. The cursor gutter is drawn at render time so
//! moving the cursor never needs a relayout.

use std::collections::HashMap;
use std::ops::Range;

use ratatui::style::{Modifier, Style as TextStyle};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::cache::CacheKey;
use crate::document::{Block, BlockId, BlockKind, RenderState};
use crate::search::SearchEngine;
use crate::session::SessionController;

use super::Palette;

/// Columns reserved on the left for the cursor marker.
pub const GUTTER_WIDTH: u16 = 2;

/// One terminal row of the laid-out document.
#[derive(Debug, Clone, PartialEq)]
pub struct LaidLine {
    pub block: BlockId,
    /// First row of its block; the cursor marker goes here.
    pub first: bool,
    pub line: Line<'static>,
}

/// Pixel sizes of decoded artifacts, keyed like the cache.
pub type ArtifactSizes = HashMap<CacheKey, (u32, u32)>;

/// Lay out every visible block at `width` columns, gutter included.
pub fn layout(
    session: &SessionController,
    palette: &Palette,
    width: u16,
    sizes: &ArtifactSizes,
) -> Vec<LaidLine> {
    let width = usize::from(width.saturating_sub(GUTTER_WIDTH).max(1));
    let search = session.search();
    let mut out = Vec::new();
    for (i, block) in session.visible_blocks().into_iter().enumerate() {
        if i > 0 {
            // Gap rows belong to the block above them.
            if let Some(prev) = out.last().map(|l: &LaidLine| l.block) {
                out.push(LaidLine {
                    block: prev,
                    first: false,
                    line: Line::default(),
                });
            }
        }
        let collapsed = session.is_collapsed(block.id());
        let lines = block_lines(block, collapsed, search, palette, width, sizes);
        out.extend(lines.into_iter().enumerate().map(|(n, line)| LaidLine {
            block: block.id(),
            first: n == 0,
            line,
        }));
    }
    out
}

fn block_lines(
    block: &Block,
    collapsed: bool,
    search: &SearchEngine,
    palette: &Palette,
    width: usize,
    sizes: &ArtifactSizes,
) -> Vec<Line<'static>> {
    let marks = marks_for(block, search, palette);
    let base = palette.for_kind(block.kind());
    let text = block.text();
    match block.kind() {
        BlockKind::Heading(_) => {
            let icon = if collapsed { "▶ " } else { "▼ " };
            let ranges = wrap_ranges(text, width.saturating_sub(2).max(1));
            ranges
                .into_iter()
                .enumerate()
                .map(|(n, range)| {
                    let lead = if n == 0 { icon } else { "  " };
                    let mut spans = vec![Span::styled(lead, base)];
                    spans.extend(highlight(text, range, &marks, base));
                    Line::from(spans)
                })
                .collect()
        }
        BlockKind::Callout(_) => {
            let bar = Span::styled("┃ ", palette.quote);
            let title_end = text.find('\n').unwrap_or(text.len());
            wrap_ranges(text, width.saturating_sub(2).max(1))
                .into_iter()
                .map(|range| {
                    let style = if range.start < title_end {
                        base.add_modifier(Modifier::BOLD)
                    } else {
                        base
                    };
                    let mut spans = vec![bar.clone()];
                    spans.extend(highlight(text, range, &marks, style));
                    Line::from(spans)
                })
                .collect()
        }
        BlockKind::Code(language) => {
            let mut lines = Vec::new();
            if let Some(language) = language {
                lines.push(Line::styled(language.clone(), palette.muted));
            }
            lines.extend(
                wrap_ranges(text, usize::MAX)
                    .into_iter()
                    .map(|range| Line::from(highlight(text, range, &marks, base))),
            );
            lines
        }
        BlockKind::Diagram | BlockKind::Image => {
            let mut lines = vec![render_status_line(block, palette, sizes)];
            if block.render_state().is_displayable() {
                lines.extend(
                    wrap_ranges(text, width)
                        .into_iter()
                        .filter(|range| !range.is_empty())
                        .map(|range| Line::from(highlight(text, range, &marks, base))),
                );
            }
            lines
        }
        BlockKind::Text | BlockKind::Table => wrap_ranges(text, width)
            .into_iter()
            .map(|range| Line::from(highlight(text, range, &marks, base)))
            .collect(),
    }
}

fn render_status_line(block: &Block, palette: &Palette, sizes: &ArtifactSizes) -> Line<'static> {
    let what = match block.kind() {
        BlockKind::Image => format!("image {}", block.source()),
        _ => "mermaid diagram".to_string(),
    };
    match block.render_state() {
        RenderState::Inline => Line::default(),
        RenderState::Pending => Line::styled(format!("◌ queued {what}"), palette.muted),
        RenderState::Rendering => Line::styled(format!("◐ rendering {what}…"), palette.muted),
        RenderState::Ready(artifact) => {
            let size = sizes.get(artifact.key()).map_or_else(
                || artifact.key().format().name().to_string(),
                |(w, h)| format!("{w}×{h}"),
            );
            Line::from(vec![
                Span::styled(format!("■ {what} "), palette.ready),
                Span::styled(size, palette.ready.add_modifier(Modifier::BOLD)),
                Span::styled(format!("  {}", artifact.path().display()), palette.muted),
            ])
        }
        RenderState::Error(reason) => {
            Line::styled(format!("✗ {what} failed: {reason}"), palette.error)
        }
    }
}

/// Match byte ranges in a block's text, with the style each is drawn in.
fn marks_for(
    block: &Block,
    search: &SearchEngine,
    palette: &Palette,
) -> Vec<(Range<usize>, TextStyle)> {
    let active = search.active_match();
    search
        .matches_in(block.id())
        .map(|m| {
            let style = if Some(*m) == active {
                palette.active_match
            } else {
                palette.matched
            };
            (m.offset..m.offset + m.len, style)
        })
        .collect()
}

/// Spans for `text[range]`, with the parts covered by `marks` restyled.
fn highlight(
    text: &str,
    range: Range<usize>,
    marks: &[(Range<usize>, TextStyle)],
    base: TextStyle,
) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut pos = range.start;
    for (mark, style) in marks {
        if mark.end <= pos || mark.start >= range.end {
            continue;
        }
        let start = mark.start.max(pos);
        let end = mark.end.min(range.end);
        if start > pos {
            spans.push(Span::styled(text[pos..start].to_string(), base));
        }
        spans.push(Span::styled(text[start..end].to_string(), base.patch(*style)));
        pos = end;
    }
    if pos < range.end {
        spans.push(Span::styled(text[pos..range.end].to_string(), base));
    }
    spans
}

/// Greedy word wrap by display width. Returns byte ranges into `text`, one
/// per row; hard newlines always start a row. Words wider than `width` are
/// split.
pub fn wrap_ranges(text: &str, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut base = 0;
    for raw in text.split('\n') {
        let mut start = 0;
        let mut cols = 0;
        let mut last_break = None;
        for (i, ch) in raw.char_indices() {
            let w = ch.width().unwrap_or(0);
            // Spaces may hang past the edge; they never start a row.
            if cols + w > width && i > start && ch != ' ' {
                let cut = last_break.filter(|&b| b > start).unwrap_or(i);
                rows.push(base + start..base + cut);
                start = cut;
                cols = raw[start..i].width();
                last_break = None;
            }
            cols += w;
            if ch == ' ' {
                last_break = Some(i + 1);
            }
        }
        rows.push(base + start..base + raw.len());
        base += raw.len() + 1;
    }
    rows
}
