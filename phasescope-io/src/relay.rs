//! # Ingestion Relay
//!
//! Holds the single latest sample process-wide and fans every new, distinct
//! sample out to the connected viewers. No history is kept here; each
//! viewer keeps its own window.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::sample::{ParseError, Sample};

/// Per-subscriber queue depth. A viewer that falls this far behind misses
/// samples instead of stalling the producer.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// What happened to a pushed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Stored as the new latest and offered to every subscriber.
    Broadcast { delivered: usize, lagging: usize, dropped: usize },
    /// Identical to the stored latest sample; nothing was forwarded.
    Duplicate,
}

/// A viewer's handle on the relay fan-out.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    rx: mpsc::Receiver<Sample>,
}

impl Subscription {
    /// Next sample, or `None` once the relay shut down.
    pub async fn recv(&mut self) -> Option<Sample> {
        self.rx.recv().await
    }

    pub fn into_receiver(self) -> mpsc::Receiver<Sample> {
        self.rx
    }
}

/// The relay state object: created at relay start, replaced per push,
/// torn down by [`IngestionRelay::shutdown`].
///
/// Lock order is `latest`, then `subscribers`. A publish keeps `latest`
/// locked until its fan-out is done, so fan-outs never interleave and a
/// subscriber registers either before a publish or after it.
#[derive(Debug)]
pub struct IngestionRelay {
    latest: RwLock<Option<Sample>>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Sample>>>,
    buffer: usize,
}

impl Default for IngestionRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionRelay {
    pub fn new() -> Self {
        Self::with_buffer(SUBSCRIBER_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            latest: RwLock::new(None),
            subscribers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// The most recently stored sample (pull variant).
    pub async fn latest(&self) -> Option<Sample> {
        *self.latest.read().await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Register a viewer. The current latest sample, if any, is queued
    /// immediately so a new viewer does not wait for the next push.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let latest = self.latest.read().await;
        if let Some(sample) = *latest {
            let _ = tx.try_send(sample);
        }
        self.subscribers.lock().await.insert(id, tx);
        drop(latest);

        tracing::info!(subscriber = %id, "viewer subscribed");

        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            tracing::info!(subscriber = %id, "viewer unsubscribed");
        }
    }

    /// Parse a raw device payload and publish it. Malformed payloads are
    /// logged and dropped; the error is returned so the caller can answer
    /// the device.
    pub async fn ingest_raw(&self, payload: &str) -> Result<PublishOutcome, ParseError> {
        match Sample::parse(payload) {
            Ok(sample) => Ok(self.publish(sample).await),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed telemetry payload");
                Err(e)
            }
        }
    }

    /// Store `sample` as the latest and forward it to every subscriber.
    ///
    /// Never waits on a consumer: a full queue skips that consumer for this
    /// sample, a closed queue removes the consumer.
    pub async fn publish(&self, sample: Sample) -> PublishOutcome {
        let mut latest = self.latest.write().await;
        if latest.as_ref().is_some_and(|prev| prev.is_repeat_of(&sample)) {
            tracing::debug!("duplicate sample ignored");
            return PublishOutcome::Duplicate;
        }
        *latest = Some(sample);

        let mut subscribers = self.subscribers.lock().await;
        let mut delivered = 0;
        let mut lagging = 0;
        let mut dropped = 0;

        subscribers.retain(|id, tx| match tx.try_send(sample) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                lagging += 1;
                tracing::warn!(subscriber = %id, "viewer lagging, sample skipped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                dropped += 1;
                tracing::info!(subscriber = %id, "viewer disconnected, dropped from relay");
                false
            }
        });
        drop(subscribers);
        drop(latest);

        PublishOutcome::Broadcast {
            delivered,
            lagging,
            dropped,
        }
    }

    /// Release every subscriber and forget the latest sample.
    pub async fn shutdown(&self) {
        let mut latest = self.latest.write().await;
        let released = {
            let mut subscribers = self.subscribers.lock().await;
            let n = subscribers.len();
            subscribers.clear();
            n
        };
        *latest = None;
        drop(latest);
        tracing::info!(released, "relay shut down");
    }
}
