use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod kind;
pub mod normalize;
pub mod series;
pub mod transform;

pub use diagnostics::{Diagnosis, DiagnosticsReply};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use kind::{GraphKind, SeriesShape};
pub use series::{DerivedSeries, Point, XY};
pub use transform::RemoteTransform;

/// The interface for any analysis service backend.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// POST `body` to `endpoint` and return the raw response text.
    /// Non-success statuses are errors.
    async fn post(&self, endpoint: &'static str, body: Value) -> Result<String, DispatchError>;
}

/// Direct HTTP client for the analysis service.
pub struct HttpAnalysisClient {
    http: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpAnalysisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAnalysisClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str) -> Self {
        tracing::info!("Analysis service at: {}", base_url);
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisClient {
    async fn post(&self, endpoint: &'static str, body: Value) -> Result<String, DispatchError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::unavailable(endpoint, format!("failed to contact service: {}", e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| DispatchError::unavailable(endpoint, format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(DispatchError::unavailable(
                endpoint,
                format!("service returned {}: {}", status, snippet),
            ));
        }

        Ok(text)
    }
}
