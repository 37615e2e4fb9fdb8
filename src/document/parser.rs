//! Markdown parsing with comrak.
//!
//! Turns comrak's AST into the flat block sequence the session works on.
//! Only top-level structure matters here: each top-level node becomes one
//! block, except paragraphs made only of images, which become one image
//! block per image.

use std::sync::LazyLock;

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, parse_document};
use regex::Regex;

use super::types::{Block, BlockId, BlockKind, Document};

/// `[!NOTE]`-style callout marker at the start of a block quote.
static CALLOUT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[!([A-Za-z]+)\][ \t]*").expect("callout marker pattern is valid")
});

impl Document {
    /// Parse markdown source into a Document.
    ///
    /// # Example
    ///
    /// ```
    /// use flint::document::{BlockKind, Document};
    ///
    /// let doc = Document::parse("# Hello\n\nWorld");
    /// assert_eq!(doc.len(), 2);
    /// assert_eq!(doc.blocks()[0].kind(), &BlockKind::Heading(1));
    /// ```
    pub fn parse(source: &str) -> Self {
        parse(source)
    }
}

/// Free-function form of [`Document::parse`].
pub fn parse(source: &str) -> Document {
    let arena = Arena::new();
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;

    let root = parse_document(&arena, source, &options);
    let source_lines: Vec<&str> = source.lines().collect();
    let mut builder = BlockBuilder {
        blocks: Vec::new(),
        source_lines,
    };
    for child in root.children() {
        builder.push_node(child);
    }
    Document::from_blocks(builder.blocks)
}

struct BlockBuilder<'s> {
    blocks: Vec<Block>,
    source_lines: Vec<&'s str>,
}

impl BlockBuilder<'_> {
    fn next_id(&self) -> BlockId {
        BlockId(self.blocks.len())
    }

    fn push(&mut self, kind: BlockKind, source: String, text: String, links: Vec<String>) {
        let block = Block::new(self.next_id(), kind, source, text).with_links(links);
        self.blocks.push(block);
    }

    /// Markdown lines covered by `node`.
    fn source_of<'a>(&self, node: &'a AstNode<'a>) -> String {
        let pos = node.data.borrow().sourcepos;
        let start = pos.start.line.saturating_sub(1);
        let end = pos.end.line.min(self.source_lines.len());
        if start >= end {
            return String::new();
        }
        self.source_lines[start..end].join("\n")
    }

    fn push_node<'a>(&mut self, node: &'a AstNode<'a>) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Heading(heading) => {
                let text = inline_text(node);
                let source = self.source_of(node);
                self.push(BlockKind::Heading(heading.level), source, text, collect_links(node));
            }
            NodeValue::Paragraph => {
                let images = paragraph_images(node);
                if images.is_empty() {
                    let source = self.source_of(node);
                    self.push(BlockKind::Text, source, inline_text(node), collect_links(node));
                } else {
                    for (alt, url) in images {
                        self.push(BlockKind::Image, url, alt, Vec::new());
                    }
                }
            }
            NodeValue::CodeBlock(code) => {
                let language = code
                    .info
                    .split_whitespace()
                    .next()
                    .map(str::to_ascii_lowercase)
                    .filter(|s| !s.is_empty());
                let text = code.literal.trim_end_matches('\n').to_string();
                if language.as_deref() == Some("mermaid") {
                    self.push(BlockKind::Diagram, code.literal, text, Vec::new());
                } else {
                    self.push(BlockKind::Code(language), code.literal, text, Vec::new());
                }
            }
            NodeValue::BlockQuote => {
                let body = block_text(node, '\n');
                let source = self.source_of(node);
                let links = collect_links(node);
                if let Some((label, text)) = split_callout(&body) {
                    self.push(BlockKind::Callout(label), source, text, links);
                } else {
                    self.push(BlockKind::Text, source, body, links);
                }
            }
            NodeValue::Table(_) => {
                let source = self.source_of(node);
                self.push(BlockKind::Table, source, table_text(node), collect_links(node));
            }
            NodeValue::ThematicBreak => {}
            NodeValue::HtmlBlock(html) => {
                let text = html.literal.trim_end().to_string();
                self.push(BlockKind::Text, html.literal, text, Vec::new());
            }
            _ => {
                let source = self.source_of(node);
                self.push(BlockKind::Text, source, block_text(node, ' '), collect_links(node));
            }
        }
    }
}

/// Detect a callout marker and return `(label, text)` where the text starts
/// with the title-cased label (or the custom title that follows the marker).
fn split_callout(body: &str) -> Option<(String, String)> {
    let caps = CALLOUT_MARKER.captures(body)?;
    let marker = caps.get(0)?;
    let kind = caps.get(1)?.as_str();
    let label = title_case(kind);
    let rest = &body[marker.end()..];
    let (title, content) = match rest.split_once('\n') {
        Some((title, content)) => (title.trim(), content),
        None => (rest.trim(), ""),
    };
    let title = if title.is_empty() { label.as_str() } else { title };
    let text = if content.is_empty() {
        title.to_string()
    } else {
        format!("{title}\n{content}")
    };
    Some((label, text))
}

fn title_case(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}

/// Images making up an image-only paragraph, as `(alt, url)` pairs.
fn paragraph_images<'a>(node: &'a AstNode<'a>) -> Vec<(String, String)> {
    let mut images = Vec::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Image(link) => images.push((inline_text(child), link.url.clone())),
            NodeValue::SoftBreak | NodeValue::LineBreak => {}
            NodeValue::Text(t) if t.trim().is_empty() => {}
            _ => return Vec::new(),
        }
    }
    images
}

fn collect_links<'a>(node: &'a AstNode<'a>) -> Vec<String> {
    node.descendants()
        .filter_map(|n| match &n.data.borrow().value {
            NodeValue::Link(link) => Some(link.url.clone()),
            _ => None,
        })
        .collect()
}

/// Text of a block node; nested block children are separated by newlines.
/// `soft_break` is what a soft line break inside a paragraph turns into.
fn block_text<'a>(node: &'a AstNode<'a>, soft_break: char) -> String {
    let mut parts = Vec::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Paragraph | NodeValue::Heading(_) => {
                let mut text = String::new();
                inline_text_recursive(child, soft_break, &mut text);
                parts.push(text);
            }
            NodeValue::CodeBlock(code) => {
                parts.push(code.literal.trim_end_matches('\n').to_string());
            }
            _ => {
                let nested = block_text(child, soft_break);
                if !nested.is_empty() {
                    parts.push(nested);
                }
            }
        }
    }
    if parts.is_empty() {
        let mut text = String::new();
        inline_text_recursive(node, soft_break, &mut text);
        return text;
    }
    parts.join("\n")
}

fn table_text<'a>(node: &'a AstNode<'a>) -> String {
    node.children()
        .map(|row| {
            row.children()
                .map(|cell| inline_text(cell))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flatten inline content to plain text.
fn inline_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    inline_text_recursive(node, ' ', &mut text);
    text
}

fn inline_text_recursive<'a>(node: &'a AstNode<'a>, soft_break: char, text: &mut String) {
    match &node.data.borrow().value {
        NodeValue::Text(t) => text.push_str(t),
        NodeValue::Code(code) => text.push_str(&code.literal),
        NodeValue::SoftBreak => text.push(soft_break),
        NodeValue::LineBreak => text.push('\n'),
        NodeValue::FootnoteReference(reference) => {
            text.push_str("[^");
            text.push_str(&reference.name);
            text.push(']');
        }
        _ => {
            for child in node.children() {
                inline_text_recursive(child, soft_break, text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RenderState;

    #[test]
    fn test_parse_headings_and_paragraphs() {
        let doc = parse("# Title\n\nSome *body* text.\n\n## Sub");
        let kinds: Vec<_> = doc.blocks().iter().map(|b| b.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![BlockKind::Heading(1), BlockKind::Text, BlockKind::Heading(2)]
        );
        assert_eq!(doc.blocks()[1].text(), "Some body text.");
        assert_eq!(doc.blocks()[0].source(), "# Title");
    }

    #[test]
    fn test_associated_parse_matches_free_function() {
        let source = "# Title\n\n> [!TIP]\n> Read on.";
        assert_eq!(Document::parse(source).blocks(), parse(source).blocks());
    }

    #[test]
    fn test_mermaid_fence_becomes_pending_diagram() {
        let doc = parse("```mermaid\ngraph TD\n  A --> B\n```\n");
        let block = &doc.blocks()[0];
        assert_eq!(block.kind(), &BlockKind::Diagram);
        assert_eq!(block.source(), "graph TD\n  A --> B\n");
        assert_eq!(block.render_state(), &RenderState::Pending);
    }

    #[test]
    fn test_other_fences_are_code() {
        let doc = parse("```rust\nfn main() {}\n```\n");
        assert_eq!(
            doc.blocks()[0].kind(),
            &BlockKind::Code(Some("rust".to_string()))
        );
        assert_eq!(doc.blocks()[0].render_state(), &RenderState::Inline);
    }

    #[test]
    fn test_image_only_paragraph_yields_image_blocks() {
        let doc = parse("![logo](img/logo.png)\n![other](https://example.com/a.jpg)");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.blocks()[0].kind(), &BlockKind::Image);
        assert_eq!(doc.blocks()[0].source(), "img/logo.png");
        assert_eq!(doc.blocks()[0].text(), "logo");
        assert_eq!(doc.blocks()[1].source(), "https://example.com/a.jpg");
    }

    #[test]
    fn test_image_inside_text_stays_text() {
        let doc = parse("See ![x](x.png) here");
        assert_eq!(doc.blocks()[0].kind(), &BlockKind::Text);
    }

    #[test]
    fn test_callout_marker_sets_label_and_title() {
        let doc = parse("> [!WARNING]\n> Mind the gap");
        let block = &doc.blocks()[0];
        assert_eq!(block.kind(), &BlockKind::Callout("Warning".to_string()));
        assert_eq!(block.text(), "Warning\nMind the gap");
    }

    #[test]
    fn test_plain_quote_is_text() {
        let doc = parse("> just a quote");
        assert_eq!(doc.blocks()[0].kind(), &BlockKind::Text);
        assert_eq!(doc.blocks()[0].text(), "just a quote");
    }

    #[test]
    fn test_links_are_collected() {
        let doc = parse("Read [the guide](guide.md) and <https://example.com>.");
        assert_eq!(
            doc.blocks()[0].links(),
            &["guide.md".to_string(), "https://example.com".to_string()]
        );
    }

    #[test]
    fn test_table_text_joins_cells() {
        let doc = parse("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert_eq!(doc.blocks()[0].kind(), &BlockKind::Table);
        assert_eq!(doc.blocks()[0].text(), "a | b\n1 | 2");
    }

    #[test]
    fn test_list_items_on_separate_lines() {
        let doc = parse("- one\n- two\n");
        assert_eq!(doc.blocks()[0].text(), "one\ntwo");
    }

    #[test]
    fn test_thematic_break_is_skipped() {
        let doc = parse("a\n\n---\n\nb");
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.blocks()[1].id(), BlockId(1));
    }

    #[test]
    fn test_split_callout_without_marker() {
        assert!(split_callout("plain").is_none());
        let (label, text) = split_callout("[!note] Custom title\nbody").unwrap();
        assert_eq!(label, "Note");
        assert_eq!(text, "Custom title\nbody");
    }
}
