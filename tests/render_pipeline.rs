//! End-to-end behavior of the render pipeline as seen through a session.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;

use flint::cache::{CacheKey, CacheStore};
use flint::document::{self, BlockId, RenderState};
use flint::render::{
    ArtifactRenderer, CoordinatorOptions, RenderCoordinator, RenderError, RenderFormat, RenderJob,
    Renderers, RetryPolicy,
};
use flint::session::{SessionController, SessionOptions};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nmock artifact";

type Respond = dyn Fn(&str, u32) -> Result<Vec<u8>, RenderError> + Send + Sync;

/// Renderer whose answer is scripted per call; call numbers start at 1.
struct Scripted {
    calls: AtomicU32,
    respond: Box<Respond>,
}

impl Scripted {
    fn new(
        respond: impl Fn(&str, u32) -> Result<Vec<u8>, RenderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            respond: Box::new(respond),
        })
    }

    fn ok() -> Arc<Self> {
        Self::new(|_, _| Ok(PNG.to_vec()))
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactRenderer for Scripted {
    fn version_tag(&self) -> &str {
        "scripted/1"
    }

    fn render(&self, source: &str, _format: RenderFormat) -> Result<Vec<u8>, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(source, call)
    }
}

fn session_with(
    cache: &Path,
    renderer: &Arc<Scripted>,
    workers: usize,
    attempts: u32,
) -> SessionController {
    let renderer: Arc<dyn ArtifactRenderer> = renderer.clone();
    let coordinator = RenderCoordinator::new(
        CacheStore::open(cache).unwrap(),
        Renderers {
            diagram: renderer.clone(),
            image: renderer,
        },
        CoordinatorOptions {
            workers,
            retry: RetryPolicy::immediate(attempts),
        },
    )
    .unwrap();
    SessionController::new(coordinator, SessionOptions::default())
}

fn settle(session: &mut SessionController) {
    while session.pending_renders() > 0 {
        if session.wait_for_deliveries(Duration::from_secs(10)) == 0 {
            break;
        }
    }
}

fn mermaid(source: &str) -> String {
    format!("```mermaid\n{source}\n```\n\n")
}

fn diagram_key(session: &SessionController, source: &str) -> CacheKey {
    session
        .coordinator()
        .key_for(&RenderJob::diagram(source, RenderFormat::Png))
}

#[test]
fn test_identical_diagrams_render_once_and_share_artifact() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::ok();
    let mut session = session_with(dir.path(), &renderer, 4, 1);
    let markdown = format!("{}{}", mermaid("graph TD; A-->B"), mermaid("graph TD; A-->B"));
    session.load(document::parse(&markdown));
    settle(&mut session);

    assert_eq!(renderer.calls(), 1);
    let states: Vec<_> = session.blocks().iter().map(|b| b.render_state()).collect();
    assert!(matches!(states[0], RenderState::Ready(_)));
    assert_eq!(states[0], states[1]);
}

#[test]
fn test_same_key_never_renders_concurrently() {
    let dir = tempdir().unwrap();
    let active: Arc<Mutex<HashMap<String, u32>>> = Arc::default();
    let overlap = Arc::new(AtomicU32::new(0));
    let renderer = {
        let active = Arc::clone(&active);
        let overlap = Arc::clone(&overlap);
        Scripted::new(move |source, _| {
            {
                let mut active = active.lock().unwrap();
                let count = active.entry(source.to_string()).or_default();
                *count += 1;
                if *count > 1 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
            }
            std::thread::sleep(Duration::from_millis(50));
            *active.lock().unwrap().get_mut(source).unwrap() -= 1;
            Ok(PNG.to_vec())
        })
    };
    let mut session = session_with(dir.path(), &renderer, 4, 1);
    let markdown = [
        mermaid("graph A"),
        mermaid("graph A"),
        mermaid("graph B"),
        mermaid("graph A"),
        mermaid("graph B"),
        mermaid("graph C"),
    ]
    .concat();
    session.load(document::parse(&markdown));
    settle(&mut session);

    assert_eq!(overlap.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.calls(), 3);
    assert_eq!(session.pending_renders(), 0);
}

#[test]
fn test_cache_put_get_round_trip_is_byte_identical() {
    let dir = tempdir().unwrap();
    let store = CacheStore::open(dir.path()).unwrap();
    let key = CacheKey::new("graph TD; A-->B", RenderFormat::Png, "scripted/1");
    store.put(&key, PNG).unwrap();
    let entry = store.get(&key).unwrap();
    assert_eq!(store.read(&entry).unwrap(), PNG);
}

#[test]
fn test_second_session_is_served_from_cache() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::ok();
    let markdown = mermaid("graph TD; cached");

    let mut first = session_with(dir.path(), &renderer, 1, 1);
    first.load(document::parse(&markdown));
    settle(&mut first);
    drop(first);

    let mut second = session_with(dir.path(), &renderer, 1, 1);
    second.load(document::parse(&markdown));
    settle(&mut second);
    assert_eq!(renderer.calls(), 1);
    assert!(matches!(
        second.blocks()[0].render_state(),
        RenderState::Ready(_)
    ));
}

#[test]
fn test_search_finds_single_match_in_error_callout() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::ok();
    let mut session = session_with(dir.path(), &renderer, 1, 1);
    let markdown = "\
> [!NOTE]
> Keep the cache warm.

> [!ERROR]
> The render service refused the request.

> [!TIP]
> Retry later.
";
    session.load(document::parse(markdown));

    assert_eq!(session.set_query("Error"), 1);
    let only = session.search().matches()[0];
    assert_eq!(only.block, BlockId(1));
    assert_eq!(&session.blocks()[1].text()[only.offset..only.offset + only.len], "Error");

    let first = session.next_match();
    let second = session.next_match();
    assert_eq!(first, Some(only));
    assert_eq!(second, Some(only));
}

#[test]
fn test_timeouts_within_retry_budget_end_ready() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::new(|_, call| {
        if call <= 2 {
            Err(RenderError::Timeout)
        } else {
            Ok(PNG.to_vec())
        }
    });
    let mut session = session_with(dir.path(), &renderer, 1, 3);
    session.load(document::parse(&mermaid("graph TD; slow")));
    settle(&mut session);

    assert_eq!(renderer.calls(), 3);
    assert!(matches!(
        session.blocks()[0].render_state(),
        RenderState::Ready(_)
    ));
}

#[test]
fn test_network_errors_exhaust_budget_and_are_not_cached() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::new(|_, _| Err(RenderError::Network("connection reset".into())));
    let mut session = session_with(dir.path(), &renderer, 1, 3);
    let markdown = mermaid("graph TD; down");
    session.load(document::parse(&markdown));
    settle(&mut session);

    assert_eq!(renderer.calls(), 3);
    let RenderState::Error(reason) = session.blocks()[0].render_state() else {
        panic!("expected error state");
    };
    assert!(reason.contains("connection reset"), "{reason}");
    assert!(session.coordinator().cache().is_empty());

    // A fresh load tries again.
    session.load(document::parse(&markdown));
    settle(&mut session);
    assert_eq!(renderer.calls(), 6);
}

#[test]
fn test_invalid_source_is_attempted_once() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::new(|_, _| Err(RenderError::InvalidSource("syntax".into())));
    let mut session = session_with(dir.path(), &renderer, 1, 3);
    session.load(document::parse(&mermaid("graph ???")));
    settle(&mut session);

    assert_eq!(renderer.calls(), 1);
    assert!(matches!(
        session.blocks()[0].render_state(),
        RenderState::Error(_)
    ));
}

#[test]
fn test_clearing_cache_forces_rerender() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::ok();
    let mut session = session_with(dir.path(), &renderer, 1, 1);
    let markdown = mermaid("graph TD; A-->B");
    session.load(document::parse(&markdown));
    settle(&mut session);
    let key = diagram_key(&session, "graph TD; A-->B");
    assert!(session.coordinator().cache().get(&key).is_some());

    assert_eq!(session.coordinator().cache().clear().unwrap(), 1);
    assert!(session.coordinator().cache().get(&key).is_none());

    session.load(document::parse(&markdown));
    settle(&mut session);
    assert_eq!(renderer.calls(), 2);
    assert!(matches!(
        session.blocks()[0].render_state(),
        RenderState::Ready(_)
    ));
}

#[test]
fn test_corrupt_cache_entry_is_rerendered() {
    let dir = tempdir().unwrap();
    let renderer = Scripted::ok();
    let mut session = session_with(dir.path(), &renderer, 1, 1);
    let key = diagram_key(&session, "graph TD; broken");
    let path = session.coordinator().cache().path_for(&key);
    std::fs::write(&path, b"<html>not an image</html>").unwrap();

    session.load(document::parse(&mermaid("graph TD; broken")));
    settle(&mut session);

    assert_eq!(renderer.calls(), 1);
    assert_eq!(std::fs::read(&path).unwrap(), PNG);
}

#[test]
fn test_delivery_for_abandoned_document_does_not_touch_new_one() {
    let dir = tempdir().unwrap();
    let (release, gate): (mpsc::Sender<()>, Receiver<()>) = mpsc::channel();
    let gate = Mutex::new(gate);
    let renderer = Scripted::new(move |source, _| {
        if source.contains("slow") {
            let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(10));
        }
        Ok(PNG.to_vec())
    });
    let mut session = session_with(dir.path(), &renderer, 2, 1);

    session.load(document::parse(&mermaid("graph slow")));
    session.load(document::parse(&mermaid("graph fast")));
    settle(&mut session);
    let fast = diagram_key(&session, "graph fast");
    let RenderState::Ready(artifact) = session.blocks()[0].render_state().clone() else {
        panic!("new document should be ready");
    };
    assert_eq!(artifact.key(), &fast);

    release.send(()).unwrap();
    assert_eq!(session.wait_for_deliveries(Duration::from_secs(10)), 0);
    assert_eq!(
        session.blocks()[0].render_state(),
        &RenderState::Ready(artifact)
    );
    // The abandoned render still lands in the cache.
    let slow = diagram_key(&session, "graph slow");
    assert!(session.coordinator().cache().get(&slow).is_some());
}

#[test]
fn test_cache_hit_is_not_queued_behind_slow_render() {
    let dir = tempdir().unwrap();
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let renderer = Scripted::new(move |_, _| {
        let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(10));
        Ok(PNG.to_vec())
    });
    let mut session = session_with(dir.path(), &renderer, 1, 1);
    let cached = diagram_key(&session, "graph cached");
    session.coordinator().cache().put(&cached, PNG).unwrap();

    let markdown = format!("{}{}", mermaid("graph slow"), mermaid("graph cached"));
    session.load(document::parse(&markdown));
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while !matches!(session.blocks()[1].render_state(), RenderState::Ready(_))
        && std::time::Instant::now() < deadline
    {
        session.wait_for_deliveries(Duration::from_millis(100));
    }

    let RenderState::Ready(artifact) = session.blocks()[1].render_state() else {
        panic!("cached block should be ready while the only worker is busy");
    };
    assert_eq!(artifact.key(), &cached);
    assert!(!session.blocks()[0].render_state().is_terminal());

    release.send(()).unwrap();
    settle(&mut session);
    assert_eq!(renderer.calls(), 1);
}

#[test]
fn test_reload_reattaches_to_render_still_in_flight() {
    let dir = tempdir().unwrap();
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let renderer = Scripted::new(move |_, _| {
        let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(10));
        Ok(PNG.to_vec())
    });
    let mut session = session_with(dir.path(), &renderer, 2, 1);
    let markdown = mermaid("graph TD; shared");

    session.load(document::parse(&markdown));
    session.load(document::parse(&markdown));
    release.send(()).unwrap();
    settle(&mut session);

    assert_eq!(renderer.calls(), 1);
    assert!(matches!(
        session.blocks()[0].render_state(),
        RenderState::Ready(_)
    ));
}
