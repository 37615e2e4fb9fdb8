use std::path::Path;
use std::sync::Arc;

use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tempfile::tempdir;

use super::*;
use crate::app::{Message, Model, update};
use crate::cache::CacheStore;
use crate::document::{self, BlockId};
use crate::render::{
    ArtifactRenderer, CoordinatorOptions, RenderCoordinator, RenderError, RenderFormat, Renderers,
    RetryPolicy,
};
use crate::session::{SessionController, SessionOptions};

struct Failing;

impl ArtifactRenderer for Failing {
    fn version_tag(&self) -> &str {
        "failing/1"
    }

    fn render(&self, _source: &str, _format: RenderFormat) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::InvalidSource("bad diagram".to_string()))
    }
}

fn session(cache: &Path, markdown: &str) -> SessionController {
    let renderer: Arc<dyn ArtifactRenderer> = Arc::new(Failing);
    let coordinator = RenderCoordinator::new(
        CacheStore::open(cache).unwrap(),
        Renderers {
            diagram: renderer.clone(),
            image: renderer,
        },
        CoordinatorOptions {
            workers: 1,
            retry: RetryPolicy::immediate(1),
        },
    )
    .unwrap();
    let mut session = SessionController::new(coordinator, SessionOptions::default());
    session.load(document::parse(markdown));
    session
}

fn text_of(line: &LaidLine) -> String {
    line.line.spans.iter().map(|s| s.content.as_ref()).collect()
}

fn rows(session: &SessionController, width: u16) -> Vec<String> {
    let palette = Style::default().palette();
    layout(session, &palette, width, &ArtifactSizes::new())
        .iter()
        .map(text_of)
        .collect()
}

#[test]
fn test_headings_show_fold_state() {
    let dir = tempdir().unwrap();
    let mut session = session(dir.path(), "# Top\n\nbody\n\n# Next");
    assert_eq!(rows(&session, 40), vec!["▼ Top", "", "body", "", "▼ Next"]);

    session.toggle_section(BlockId(0));
    assert_eq!(rows(&session, 40), vec!["▶ Top", "", "▼ Next"]);
}

#[test]
fn test_gap_rows_belong_to_block_above() {
    let dir = tempdir().unwrap();
    let session = session(dir.path(), "one\n\ntwo");
    let palette = Style::default().palette();
    let lines = layout(&session, &palette, 40, &ArtifactSizes::new());
    let owners: Vec<_> = lines.iter().map(|l| (l.block.0, l.first)).collect();
    assert_eq!(owners, vec![(0, true), (0, false), (1, true)]);
}

#[test]
fn test_paragraphs_wrap_inside_gutter() {
    let dir = tempdir().unwrap();
    let session = session(dir.path(), "alpha beta gamma");
    // 12 columns minus the 2 column gutter.
    assert_eq!(rows(&session, 12), vec!["alpha beta ", "gamma"]);
}

#[test]
fn test_pending_diagram_shows_placeholder_without_source() {
    let dir = tempdir().unwrap();
    let session = session(dir.path(), "```mermaid\ngraph TD; A-->B\n```");
    let rows = rows(&session, 60);
    assert_eq!(rows.len(), 1);
    assert!(
        rows[0].contains("mermaid diagram"),
        "unexpected placeholder: {}",
        rows[0]
    );
}

#[test]
fn test_failed_diagram_shows_reason() {
    let dir = tempdir().unwrap();
    let mut session = session(dir.path(), "```mermaid\ngraph TD; A-->B\n```");
    while session.pending_renders() > 0 {
        if session.wait_for_deliveries(std::time::Duration::from_secs(5)) == 0 {
            break;
        }
    }
    let rows = rows(&session, 80);
    assert!(rows[0].starts_with("✗ mermaid diagram failed"), "{}", rows[0]);
    assert!(rows[0].contains("bad diagram"));
}

#[test]
fn test_search_matches_are_split_into_spans() {
    let dir = tempdir().unwrap();
    let mut session = session(dir.path(), "a needle in a haystack");
    session.set_query("NEEDLE");
    session.next_match();
    let palette = Style::default().palette();
    let lines = layout(&session, &palette, 80, &ArtifactSizes::new());
    let spans = &lines[0].line.spans;
    assert_eq!(spans[1].content, "needle");
    assert_eq!(spans[1].style.bg, palette.active_match.bg);
}

#[test]
fn test_render_draws_cursor_and_status_bar() {
    let dir = tempdir().unwrap();
    let session = session(dir.path(), "# Title\n\nbody");
    let model = Model::new(session, (40, 6));
    let mut terminal = Terminal::new(TestBackend::new(40, 6)).unwrap();
    terminal.draw(|frame| render(&model, frame)).unwrap();

    let buffer = terminal.backend().buffer();
    let row = |y: u16| -> String {
        (0..40)
            .map(|x| buffer[(x, y)].symbol().to_string())
            .collect()
    };
    assert!(row(0).starts_with("▍ ▼ Title"), "{}", row(0));
    assert!(row(2).starts_with("  body"));
    assert!(row(5).contains("untitled"));
    assert!(row(5).contains("obsidian"));
}

#[test]
fn test_render_shows_search_bar_while_typing() {
    let dir = tempdir().unwrap();
    let session = session(dir.path(), "body");
    let model = update(
        Model::new(session, (60, 6)),
        Message::SearchInput("bo".to_string()),
    );
    let mut terminal = Terminal::new(TestBackend::new(60, 6)).unwrap();
    terminal.draw(|frame| render(&model, frame)).unwrap();

    let buffer = terminal.backend().buffer();
    let search_row: String = (0..60)
        .map(|x| buffer[(x, 4)].symbol().to_string())
        .collect();
    assert!(search_row.starts_with("/bo  [1 match]"), "{search_row}");
}
