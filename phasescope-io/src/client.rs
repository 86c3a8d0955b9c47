//! Viewer-side access to a remote relay: pull polling and SSE push.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sample::Sample;

/// Default pull cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// "Give me the latest" request. `None` until the device pushed once.
    pub async fn latest(&self) -> Result<Option<Sample>> {
        let url = format!("{}/data", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to contact relay")?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(anyhow::anyhow!("Relay returned {}: {}", status, snippet(&text)));
        }

        let value: Value = serde_json::from_str(&text).context("Relay returned invalid JSON")?;
        if value.is_null() {
            return Ok(None);
        }

        let sample = Sample::from_value(&value).context("Relay returned a malformed sample")?;
        Ok(Some(sample))
    }

    /// Device-side push, as the measuring device would do it.
    pub async fn push(&self, sample: &Sample) -> Result<()> {
        let url = format!("{}/data", self.base_url);

        let resp = self
            .http
            .post(&url)
            .json(sample)
            .send()
            .await
            .context("Failed to contact relay")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Relay returned {}: {}", status, snippet(&text)));
        }
        Ok(())
    }

    /// Pull variant: poll the latest sample every `interval` and forward it.
    /// Repeats are forwarded too; the session drops them.
    pub fn spawn_poller(self, interval: Duration, tx: mpsc::Sender<Sample>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(relay = %self.base_url, ?interval, "pull poller started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.latest().await {
                    Ok(Some(sample)) => {
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "Error fetching latest data"),
                }
            }
            tracing::info!("pull poller stopped");
        })
    }

    /// Push variant: follow `/events` until the relay closes the stream.
    pub async fn follow_events(&self, tx: mpsc::Sender<Sample>) -> Result<()> {
        let url = format!("{}/events", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .context("Failed to contact relay")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Relay returned {} for event stream", status));
        }

        tracing::info!(relay = %self.base_url, "following relay events");

        let mut body = resp.bytes_stream();
        let mut parser = SseParser::default();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("Relay event stream broke")?;
            for data in parser.feed(&chunk) {
                match Sample::parse(&data) {
                    Ok(sample) => {
                        if tx.send(sample).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping malformed relay event"),
                }
            }
        }

        tracing::info!("relay closed the event stream");
        Ok(())
    }
}

/// Minimal `text/event-stream` line assembler: yields the `data` payload of
/// every completed event.
///
/// Chunks are raw bytes and may end anywhere, including inside a multibyte
/// character; only complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
            // event:, id:, retry: and comments carry nothing we need.
        }

        events
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}
