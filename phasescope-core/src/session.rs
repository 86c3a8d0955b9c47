//! The viewer session: one window, one tab board, one recompute pipeline.
//!
//! Every accepted sample bumps the window version and fans out a recompute
//! to every graph in every tab. Local kinds are committed before `ingest`
//! returns; remote kinds run as background tasks that commit only if no
//! newer window has been committed for the same graph in the meantime.
//!
//! A graph has at most one remote request outstanding. Rounds that arrive
//! while it is busy overwrite a single pending snapshot, which is sent once
//! the outstanding request finishes.

use std::collections::HashMap;
use std::sync::Arc;

use phasescope_analysis::{DerivedSeries, Dispatcher, GraphKind, RemoteTransform};
use phasescope_io::Sample;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;

use crate::board::{CommitOutcome, GraphId, Tab, TabBoard, TabId};
use crate::config::SessionConfig;
use crate::diagnostics::{DiagnosticsResult, DiagnosticsScheduler};
use crate::error::SessionError;
use crate::local;
use crate::window::SlidingWindow;

/// The window as published to background readers.
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    pub version: u64,
    pub samples: Arc<[Sample]>,
}

impl Default for WindowSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            samples: Arc::from(Vec::new()),
        }
    }
}

/// Graphs with a remote request outstanding, each with the newest window
/// still waiting to be sent.
type Queue = Arc<Mutex<HashMap<GraphId, Option<WindowSnapshot>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The window changed; a recompute round was started.
    Appended { version: u64 },
    /// Identical to the window tail; nothing happened.
    Duplicate,
}

pub struct ViewerSession {
    config: SessionConfig,
    window: SlidingWindow,
    version: u64,
    board: Arc<RwLock<TabBoard>>,
    dispatcher: Dispatcher,
    inflight: JoinSet<()>,
    queue: Queue,
    snapshots: watch::Sender<WindowSnapshot>,
    diagnostics: Option<DiagnosticsScheduler>,
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("profile", &self.config.profile)
            .field("window_len", &self.window.len())
            .field("version", &self.version)
            .field("inflight", &self.inflight.len())
            .finish()
    }
}

impl ViewerSession {
    /// Must be called inside a Tokio runtime when the profile supports
    /// diagnostics, since the scheduler loop is spawned here.
    pub fn new(config: SessionConfig, dispatcher: Dispatcher) -> Self {
        let (snapshots, snapshot_rx) = watch::channel(WindowSnapshot::default());

        let diagnostics = config.profile.supports_diagnostics().then(|| {
            DiagnosticsScheduler::start(dispatcher.clone(), snapshot_rx, &config.diagnostics)
        });

        tracing::info!(
            profile = ?config.profile,
            capacity = config.window_capacity,
            "Viewer session started"
        );

        Self {
            window: SlidingWindow::new(config.window_capacity),
            config,
            version: 0,
            board: Arc::new(RwLock::new(TabBoard::new())),
            dispatcher,
            inflight: JoinSet::new(),
            queue: Arc::new(Mutex::new(HashMap::new())),
            snapshots,
            diagnostics,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Shared handle for readers that render the board.
    pub fn board(&self) -> Arc<RwLock<TabBoard>> {
        self.board.clone()
    }

    /// Number of recompute tasks not yet reaped. Never more than one per
    /// remote graph.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Append a sample and, if the window changed, recompute every graph.
    pub async fn ingest(&mut self, sample: Sample) -> IngestOutcome {
        self.reap();

        if !self.window.push_distinct(sample) {
            tracing::debug!("Duplicate sample ignored");
            return IngestOutcome::Duplicate;
        }

        self.version += 1;
        let snapshot = WindowSnapshot {
            version: self.version,
            samples: self.window.snapshot(),
        };
        self.snapshots.send_replace(snapshot.clone());

        let graphs: Vec<(GraphId, GraphKind)> = self.board.read().await.graphs().collect();
        for (id, kind) in graphs {
            self.recompute(id, kind, &snapshot).await;
        }

        IngestOutcome::Appended {
            version: self.version,
        }
    }

    pub async fn add_tab(&self) -> TabId {
        let id = self.board.write().await.add_tab();
        tracing::info!(tab = %id, "Tab added");
        id
    }

    pub async fn switch_tab(&self, id: TabId) -> Result<(), SessionError> {
        self.board.write().await.switch_tab(id)
    }

    pub async fn active_tab(&self) -> TabId {
        self.board.read().await.active_id()
    }

    /// A copy of every tab and its graphs.
    pub async fn tabs(&self) -> Vec<Tab> {
        self.board.read().await.tabs().to_vec()
    }

    /// Add a graph of `kind` to `tab` and compute it from the current window.
    pub async fn add_graph(&mut self, tab: TabId, kind: GraphKind) -> Result<GraphId, SessionError> {
        let profile = self.config.profile;
        if !profile.offers(kind) {
            tracing::warn!(%kind, ?profile, "Graph kind not offered");
            return Err(SessionError::KindNotOffered { kind, profile });
        }

        let need = self.config.min_graph_samples();
        if self.window.len() < need {
            tracing::warn!(have = self.window.len(), need, "Not enough data to add a graph");
            return Err(SessionError::InsufficientData {
                have: self.window.len(),
                need,
            });
        }

        let id = self.board.write().await.add_graph(tab, kind)?;
        tracing::info!(%kind, graph = %id, "Graph added");

        if !self.window.is_empty() {
            let snapshot = self.snapshots.borrow().clone();
            self.recompute(id, kind, &snapshot).await;
        }
        Ok(id)
    }

    async fn recompute(&mut self, id: GraphId, kind: GraphKind, snapshot: &WindowSnapshot) {
        if let Some(series) = local::derive(kind, &snapshot.samples) {
            let outcome = self.board.write().await.commit(id, snapshot.version, series);
            log_commit(id, kind, snapshot.version, outcome);
            return;
        }

        let transform = match Dispatcher::plan(kind) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(%kind, "Cannot recompute graph: {}", e);
                return;
            }
        };

        {
            let mut queue = self.queue.lock().await;
            if let Some(pending) = queue.get_mut(&id) {
                if let Some(dropped) = pending.replace(snapshot.clone()) {
                    tracing::trace!(%kind, graph = %id, version = dropped.version, "Pending window superseded");
                }
                return;
            }
            queue.insert(id, None);
        }

        self.inflight.spawn(drive_graph(
            self.dispatcher.clone(),
            self.board.clone(),
            self.queue.clone(),
            id,
            transform,
            snapshot.clone(),
        ));
    }

    /// Wait for every in-flight recompute to finish.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.inflight.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("Recompute task ended abnormally: {}", e);
            }
        }
    }

    fn reap(&mut self) {
        while let Some(joined) = self.inflight.try_join_next() {
            if let Err(e) = joined {
                tracing::warn!("Recompute task ended abnormally: {}", e);
            }
        }
    }

    // ────────────────────────────────────────────────────────────────
    // Diagnostics
    // ────────────────────────────────────────────────────────────────

    pub fn diagnostics(&self) -> Option<&DiagnosticsScheduler> {
        self.diagnostics.as_ref()
    }

    pub fn set_diagnostics_enabled(&self, on: bool) -> Result<(), SessionError> {
        let scheduler = self
            .diagnostics
            .as_ref()
            .ok_or(SessionError::DiagnosticsUnavailable(self.config.profile))?;
        scheduler.set_enabled(on);
        Ok(())
    }

    pub fn watch_diagnostics(&self) -> Option<watch::Receiver<Option<DiagnosticsResult>>> {
        self.diagnostics.as_ref().map(DiagnosticsScheduler::watch)
    }
}

/// Send `snapshot` for graph `id`, then keep sending whatever window was
/// queued meanwhile until the queue entry is empty.
async fn drive_graph(
    dispatcher: Dispatcher,
    board: Arc<RwLock<TabBoard>>,
    queue: Queue,
    id: GraphId,
    transform: RemoteTransform,
    mut snapshot: WindowSnapshot,
) {
    loop {
        dispatch_and_commit(&dispatcher, &board, id, transform, &snapshot).await;

        let mut queue = queue.lock().await;
        match queue.get_mut(&id).and_then(Option::take) {
            Some(next) => snapshot = next,
            None => {
                queue.remove(&id);
                return;
            }
        }
    }
}

async fn dispatch_and_commit(
    dispatcher: &Dispatcher,
    board: &RwLock<TabBoard>,
    id: GraphId,
    transform: RemoteTransform,
    snapshot: &WindowSnapshot,
) {
    let kind = transform.graph_kind();
    let series: DerivedSeries = match dispatcher.run(transform, &snapshot.samples).await {
        Ok(series) => series,
        Err(e) => {
            tracing::warn!(%kind, graph = %id, "Keeping previous data: {}", e);
            return;
        }
    };

    let outcome = board.write().await.commit(id, snapshot.version, series);
    log_commit(id, kind, snapshot.version, outcome);
}

fn log_commit(id: GraphId, kind: GraphKind, version: u64, outcome: CommitOutcome) {
    match outcome {
        CommitOutcome::Applied => {
            tracing::debug!(%kind, graph = %id, version, "Graph updated");
        }
        CommitOutcome::Stale { current } => {
            tracing::debug!(%kind, graph = %id, version, current, "Discarded stale result");
        }
        CommitOutcome::Missing => {
            tracing::debug!(%kind, graph = %id, "Graph removed before result arrived");
        }
    }
}
