//! Deduplicated background rendering.
//!
//! The coordinator lives on the UI thread and owns the table of unresolved
//! keys. Workers only ever see one job at a time and report back through a
//! single channel, so every state change for a key is applied in one place.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use super::{ArtifactRenderer, RenderError, RenderFormat, RetryPolicy};
use crate::cache::{ArtifactRef, CacheKey, CacheStore};
use crate::document::BlockId;

/// Which renderer a job goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Diagram,
    Image,
}

/// A unit of work a block asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    target: Target,
    source: String,
    format: RenderFormat,
}

impl RenderJob {
    pub fn diagram(source: impl Into<String>, format: RenderFormat) -> Self {
        Self {
            target: Target::Diagram,
            source: source.into(),
            format,
        }
    }

    /// `source` is an absolute path or an http(s) URL.
    pub fn image(source: impl Into<String>) -> Self {
        Self {
            target: Target::Image,
            source: source.into(),
            format: RenderFormat::Png,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn format(&self) -> RenderFormat {
        self.format
    }
}

/// The renderers jobs are dispatched to.
#[derive(Clone)]
pub struct Renderers {
    pub diagram: Arc<dyn ArtifactRenderer>,
    pub image: Arc<dyn ArtifactRenderer>,
}

impl Renderers {
    fn for_target(&self, target: Target) -> &Arc<dyn ArtifactRenderer> {
        match target {
            Target::Diagram => &self.diagram,
            Target::Image => &self.image,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Progress of an unresolved key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    InFlight,
}

#[derive(Debug)]
struct RenderTask {
    waiters: BTreeSet<BlockId>,
    state: TaskState,
}

/// What happened to a key, as reported to the blocks waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryUpdate {
    Started,
    Ready(ArtifactRef),
    Failed(RenderError),
}

/// One update for every block currently waiting on `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub key: CacheKey,
    pub blocks: Vec<BlockId>,
    pub update: DeliveryUpdate,
}

enum WorkerEvent {
    Started(CacheKey),
    Finished(CacheKey, Result<ArtifactRef, RenderError>),
}

struct Job {
    key: CacheKey,
    source: String,
    renderer: Arc<dyn ArtifactRenderer>,
}

struct WorkerContext {
    cache: CacheStore,
    retry: RetryPolicy,
    events: Sender<WorkerEvent>,
}

/// Schedules renders so each cache key is worked on at most once at a time.
pub struct RenderCoordinator {
    renderers: Renderers,
    tasks: HashMap<CacheKey, RenderTask>,
    lookups: Sender<Job>,
    events: Receiver<WorkerEvent>,
    events_tx: Sender<WorkerEvent>,
    cache: CacheStore,
}

impl RenderCoordinator {
    /// Start the cache lookup thread and the worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(
        cache: CacheStore,
        renderers: Renderers,
        options: CoordinatorOptions,
    ) -> std::io::Result<Self> {
        let (lookups, lookup_rx) = mpsc::channel::<Job>();
        let (jobs, job_rx) = mpsc::channel::<Job>();
        let (events_tx, events) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let ctx = Arc::new(WorkerContext {
            cache: cache.clone(),
            retry: options.retry,
            events: events_tx.clone(),
        });

        for index in 0..options.workers.max(1) {
            let job_rx = Arc::clone(&job_rx);
            let ctx = Arc::clone(&ctx);
            thread::Builder::new()
                .name(format!("flint-render-{index}"))
                .spawn(move || worker_loop(&job_rx, &ctx))?;
        }

        let lookup_cache = cache.clone();
        let lookup_events = events_tx.clone();
        thread::Builder::new()
            .name("flint-cache-lookup".to_string())
            .spawn(move || lookup_loop(&lookup_rx, &lookup_cache, &lookup_events, &jobs))?;

        Ok(Self {
            renderers,
            tasks: HashMap::new(),
            lookups,
            events,
            events_tx,
            cache,
        })
    }

    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Key `job` would be stored under.
    pub fn key_for(&self, job: &RenderJob) -> CacheKey {
        let renderer = self.renderers.for_target(job.target);
        CacheKey::new(&job.source, job.format, renderer.version_tag())
    }

    /// Ask for `job` on behalf of `block`. A key already being worked on
    /// gains another waiter instead of a second render.
    pub fn request(&mut self, block: BlockId, job: &RenderJob) -> CacheKey {
        let key = self.key_for(job);
        match self.tasks.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().waiters.insert(block);
                debug!(%key, %block, "attached to existing render");
            }
            Entry::Vacant(entry) => {
                entry.insert(RenderTask {
                    waiters: BTreeSet::from([block]),
                    state: TaskState::Queued,
                });
                let job = Job {
                    key,
                    source: job.source.clone(),
                    renderer: Arc::clone(self.renderers.for_target(job.target)),
                };
                if self.lookups.send(job).is_err() {
                    error!(%key, "render workers have stopped");
                    let failure = RenderError::Network("render workers have stopped".to_string());
                    let _ = self.events_tx.send(WorkerEvent::Finished(key, Err(failure)));
                } else {
                    debug!(%key, %block, "render queued");
                }
            }
        }
        key
    }

    pub fn task_state(&self, key: &CacheKey) -> Option<TaskState> {
        self.tasks.get(key).map(|task| task.state)
    }

    /// Number of keys still unresolved, including abandoned ones.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Forget every waiter. Workers keep going and still fill the cache; the
    /// tasks stay registered so a later request for the same key attaches.
    pub fn abandon_waiters(&mut self) {
        for task in self.tasks.values_mut() {
            task.waiters.clear();
        }
    }

    /// Drain everything workers reported so far.
    pub fn poll(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.extend(self.apply(event));
        }
        out
    }

    /// Block until the next delivery or until `timeout` passes. Returns
    /// immediately when nothing is outstanding.
    pub fn wait(&mut self, timeout: Duration) -> Option<Delivery> {
        let deadline = Instant::now() + timeout;
        while !self.tasks.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(delivery) = self.apply(event) {
                        return Some(delivery);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    fn apply(&mut self, event: WorkerEvent) -> Option<Delivery> {
        let (key, blocks, update) = match event {
            WorkerEvent::Started(key) => {
                let task = self.tasks.get_mut(&key)?;
                task.state = TaskState::InFlight;
                let blocks: Vec<BlockId> = task.waiters.iter().copied().collect();
                (key, blocks, DeliveryUpdate::Started)
            }
            WorkerEvent::Finished(key, result) => {
                let task = self.tasks.remove(&key)?;
                let update = match result {
                    Ok(artifact) => DeliveryUpdate::Ready(artifact),
                    Err(err) => DeliveryUpdate::Failed(err),
                };
                (key, task.waiters.into_iter().collect(), update)
            }
        };
        if blocks.is_empty() {
            debug!(%key, "dropping delivery with no waiters");
            return None;
        }
        Some(Delivery { key, blocks, update })
    }
}

/// Answer cache hits directly; only misses reach the render pool.
fn lookup_loop(
    lookups: &Receiver<Job>,
    cache: &CacheStore,
    events: &Sender<WorkerEvent>,
    jobs: &Sender<Job>,
) {
    while let Ok(job) = lookups.recv() {
        if let Some(entry) = cache.get(&job.key) {
            let _ = events.send(WorkerEvent::Finished(job.key, Ok(entry.artifact())));
            continue;
        }
        let key = job.key;
        if jobs.send(job).is_err() {
            error!(%key, "render workers have stopped");
            let failure = RenderError::Network("render workers have stopped".to_string());
            let _ = events.send(WorkerEvent::Finished(key, Err(failure)));
        }
    }
}

fn worker_loop(jobs: &Mutex<Receiver<Job>>, ctx: &WorkerContext) {
    loop {
        let next = {
            let guard = match jobs.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.recv()
        };
        let Ok(job) = next else {
            break;
        };
        run_job(ctx, &job);
    }
}

fn run_job(ctx: &WorkerContext, job: &Job) {
    let _ = ctx.events.send(WorkerEvent::Started(job.key));
    let format = job.key.format();
    let result = ctx
        .retry
        .run(|attempt| {
            debug!(key = %job.key, attempt, "rendering");
            job.renderer.render(&job.source, format)
        })
        .and_then(|bytes| {
            ctx.cache
                .put(&job.key, &bytes)
                .map_err(|err| RenderError::Storage(err.to_string()))
        })
        .map(|entry| entry.artifact());

    if let Err(err) = &result {
        error!(key = %job.key, %err, "render failed");
    }
    let _ = ctx.events.send(WorkerEvent::Finished(job.key, result));
}
