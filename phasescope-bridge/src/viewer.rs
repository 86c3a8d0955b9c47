//! Headless viewer: feeds a session from a sample source and reports what a
//! screen would show.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use phasescope_analysis::{Dispatcher, GraphKind};
use phasescope_core::axis;
use phasescope_core::{
    DiagnosticsResult, IngestOutcome, SessionError, TabId, ViewerSession,
};
use phasescope_io::{RelayClient, Sample, Subscription};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{Settings, SourceMode};

const SOURCE_BUFFER: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Start feeding samples from a remote relay, pulled or pushed per `mode`.
pub fn spawn_remote_source(
    client: RelayClient,
    mode: SourceMode,
    poll_interval: Duration,
) -> (mpsc::Receiver<Sample>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(SOURCE_BUFFER);
    let handle = match mode {
        SourceMode::Pull => client.spawn_poller(poll_interval, tx),
        SourceMode::Push => tokio::spawn(async move {
            while !tx.is_closed() {
                if let Err(e) = client.follow_events(tx.clone()).await {
                    tracing::warn!("Event stream lost: {:#}", e);
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }),
    };
    (rx, handle)
}

/// Forward an in-process relay subscription.
pub fn local_source(subscription: Subscription) -> mpsc::Receiver<Sample> {
    subscription.into_receiver()
}

pub struct Viewer {
    session: ViewerSession,
    /// Graphs from settings not yet added, waiting for enough samples.
    pending: Vec<(TabId, GraphKind)>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("session", &self.session)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Viewer {
    /// Build a session against the configured analysis service and lay out
    /// the configured tabs. Must be called inside a Tokio runtime.
    pub async fn new(settings: &Settings) -> Result<Self> {
        let dispatcher = Dispatcher::http(&settings.analysis.url());
        Self::with_dispatcher(settings, dispatcher).await
    }

    pub async fn with_dispatcher(settings: &Settings, dispatcher: Dispatcher) -> Result<Self> {
        let session = ViewerSession::new(settings.session.clone(), dispatcher);

        let mut pending = Vec::new();
        for (i, tab) in settings.viewer.tabs.iter().enumerate() {
            let id = if i == 0 {
                session.active_tab().await
            } else {
                session.add_tab().await
            };
            pending.extend(tab.graphs.iter().map(|kind| (id, *kind)));
        }

        if settings.viewer.diagnostics {
            session.set_diagnostics_enabled(true)?;
        }

        let mut viewer = Self { session, pending };
        viewer.add_pending_graphs().await;
        Ok(viewer)
    }

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn pending(&self) -> &[(TabId, GraphKind)] {
        &self.pending
    }

    /// Consume samples until the source ends or `shutdown` resolves.
    pub async fn run<F>(mut self, mut samples: mpsc::Receiver<Sample>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut verdicts = self.session.watch_diagnostics();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                sample = samples.recv() => match sample {
                    Some(sample) => self.on_sample(sample).await,
                    None => {
                        tracing::info!("Sample source closed");
                        break;
                    }
                },
                verdict = next_verdict(&mut verdicts) => {
                    if let Some(result) = verdict {
                        log_verdict(&result);
                    }
                }
            }
        }

        self.session.settle().await;
        Ok(())
    }

    pub async fn on_sample(&mut self, sample: Sample) {
        if let IngestOutcome::Appended { version } = self.session.ingest(sample).await {
            self.add_pending_graphs().await;
            self.report(version).await;
        }
    }

    async fn add_pending_graphs(&mut self) {
        let mut waiting = Vec::new();
        for (tab, kind) in std::mem::take(&mut self.pending) {
            match self.session.add_graph(tab, kind).await {
                Ok(_) => {}
                Err(SessionError::InsufficientData { .. }) => waiting.push((tab, kind)),
                Err(SessionError::KindNotOffered { profile, .. }) => {
                    let offered: Vec<&str> = profile.offered().map(GraphKind::name).collect();
                    tracing::warn!(%kind, ?profile, ?offered, "Skipping graph not offered by profile");
                }
                Err(e) => tracing::warn!(%kind, "Skipping configured graph: {}", e),
            }
        }
        self.pending = waiting;
    }

    async fn report(&self, version: u64) {
        let board = self.session.board();
        let board = board.read().await;
        for tab in board.tabs() {
            for graph in &tab.graphs {
                let domain = axis::domain(&graph.data, graph.kind);
                tracing::info!(
                    window = version,
                    tab = %tab.name,
                    graph = %graph.kind,
                    points = graph.data.len(),
                    x = ?domain.x,
                    y = ?domain.y,
                    "graph"
                );
            }
        }
    }
}

/// Resolves with each new verdict; never resolves without a scheduler.
async fn next_verdict(
    verdicts: &mut Option<watch::Receiver<Option<DiagnosticsResult>>>,
) -> Option<DiagnosticsResult> {
    let Some(rx) = verdicts.as_mut() else {
        return std::future::pending().await;
    };
    if rx.changed().await.is_err() {
        *verdicts = None;
        return None;
    }
    rx.borrow_and_update().clone()
}

fn log_verdict(result: &DiagnosticsResult) {
    let message = result.message.as_deref().unwrap_or("");
    match result.status.as_str() {
        "alert" => tracing::warn!(anomalies = ?result.anomaly_count, "Diagnostics ALERT: {}", message),
        "warning" => tracing::warn!(anomalies = ?result.anomaly_count, "Diagnostics warning: {}", message),
        status => tracing::info!(anomalies = ?result.anomaly_count, %status, "Diagnostics: {}", message),
    }
}
