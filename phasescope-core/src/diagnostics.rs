//! Diagnostics Scheduler.
//!
//! A single background loop owns the cadence: it parks while diagnostics are
//! disabled, runs one cycle, then sleeps for the cooldown measured from the
//! end of that cycle. Disabling cancels a pending sleep at once; a request
//! already on the wire is allowed to finish and its verdict is still
//! published.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use phasescope_analysis::{DiagnosticsReply, Dispatcher};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DiagnosticsConfig;
use crate::session::WindowSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsResult {
    pub status: String,
    pub message: Option<String>,
    pub anomaly_count: Option<u64>,
    pub received_at: DateTime<Utc>,
}

impl DiagnosticsResult {
    /// The nested diagnosis wins over the top-level fields.
    pub fn from_reply(reply: DiagnosticsReply, received_at: DateTime<Utc>) -> Self {
        let (status, message) = match reply.diagnosis {
            Some(d) => (d.status, d.message.or(reply.message)),
            None => (reply.status, reply.message),
        };
        Self {
            status,
            message,
            anomaly_count: reply.anomaly_count,
            received_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The window is still below the threshold; nothing was sent.
    InsufficientData { have: usize, need: usize },
    /// Another cycle is in flight.
    Busy,
    /// The service is still collecting rows; the previous verdict stands.
    Pending,
    Updated(DiagnosticsResult),
    /// Transport or service failure; the previous verdict stands.
    Failed,
}

/// Clears `running` however the cycle ends, including cancellation.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Cycle {
    dispatcher: Dispatcher,
    window: watch::Receiver<WindowSnapshot>,
    running: AtomicBool,
    threshold: usize,
    results: watch::Sender<Option<DiagnosticsResult>>,
}

impl Cycle {
    async fn run(&self) -> CycleOutcome {
        let samples = self.window.borrow().samples.clone();
        if samples.len() < self.threshold {
            return CycleOutcome::InsufficientData {
                have: samples.len(),
                need: self.threshold,
            };
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return CycleOutcome::Busy;
        }
        let _guard = RunningGuard(&self.running);

        let slice = &samples[samples.len() - self.threshold..];
        match self.dispatcher.analyze(slice).await {
            Ok(reply) if reply.is_pending() => {
                tracing::debug!("Diagnostics pending; keeping previous verdict");
                CycleOutcome::Pending
            }
            Ok(reply) => {
                let result = DiagnosticsResult::from_reply(reply, Utc::now());
                tracing::info!(
                    status = %result.status,
                    anomalies = ?result.anomaly_count,
                    "Diagnostics updated"
                );
                self.results.send_replace(Some(result.clone()));
                CycleOutcome::Updated(result)
            }
            Err(e) => {
                tracing::warn!("Diagnostics failed: {}", e);
                CycleOutcome::Failed
            }
        }
    }
}

pub struct DiagnosticsScheduler {
    cycle: Arc<Cycle>,
    enabled: watch::Sender<bool>,
    results: watch::Receiver<Option<DiagnosticsResult>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for DiagnosticsScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsScheduler")
            .field("enabled", &*self.enabled.borrow())
            .field("running", &self.is_running())
            .field("threshold", &self.cycle.threshold)
            .finish()
    }
}

impl DiagnosticsScheduler {
    /// Start the loop, disabled. Must be called inside a Tokio runtime.
    pub fn start(
        dispatcher: Dispatcher,
        window: watch::Receiver<WindowSnapshot>,
        config: &DiagnosticsConfig,
    ) -> Self {
        let (results_tx, results) = watch::channel(None);
        let (enabled, enabled_rx) = watch::channel(false);

        let cycle = Arc::new(Cycle {
            dispatcher,
            window,
            running: AtomicBool::new(false),
            threshold: config.threshold.max(1),
            results: results_tx,
        });

        let task = tokio::spawn(drive(cycle.clone(), enabled_rx, config.cooldown()));

        Self {
            cycle,
            enabled,
            results,
            task,
        }
    }

    pub fn set_enabled(&self, on: bool) {
        let changed = self.enabled.send_if_modified(|current| {
            let changed = *current != on;
            *current = on;
            changed
        });
        if changed {
            tracing::info!("Diagnostics {}", if on { "enabled" } else { "disabled" });
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.cycle.running.load(Ordering::Acquire)
    }

    /// Run one cycle now, outside the loop's cadence.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.cycle.run().await
    }

    pub fn latest(&self) -> Option<DiagnosticsResult> {
        self.results.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<DiagnosticsResult>> {
        self.results.clone()
    }
}

impl Drop for DiagnosticsScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(cycle: Arc<Cycle>, mut enabled: watch::Receiver<bool>, cooldown: Duration) {
    let mut last_done: Option<Instant> = None;

    loop {
        if !wait_until(&mut enabled, true).await {
            return;
        }

        if let Some(done) = last_done {
            tokio::select! {
                _ = tokio::time::sleep_until(done + cooldown) => {}
                still_open = wait_until(&mut enabled, false) => {
                    if !still_open {
                        return;
                    }
                    continue;
                }
            }
        }

        cycle.run().await;
        last_done = Some(Instant::now());
    }
}

/// Wait for `enabled` to equal `want`. Returns false once the scheduler is gone.
async fn wait_until(enabled: &mut watch::Receiver<bool>, want: bool) -> bool {
    enabled.wait_for(|on| *on == want).await.is_ok()
}
