//! Transformation Dispatcher: plan, call, normalize, reshape.

use std::sync::Arc;

use phasescope_io::Sample;

use crate::diagnostics::{analyze_request, DiagnosticsReply, ANALYZE_ENDPOINT};
use crate::error::DispatchError;
use crate::kind::GraphKind;
use crate::normalize::parse_response;
use crate::series::DerivedSeries;
use crate::transform::RemoteTransform;
use crate::{AnalysisBackend, HttpAnalysisClient};

#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn AnalysisBackend>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    pub fn http(base_url: &str) -> Self {
        Self::new(Arc::new(HttpAnalysisClient::new(base_url)))
    }

    /// Resolve the remote transform for `kind`, failing fast for kinds
    /// that have no endpoint.
    pub fn plan(kind: GraphKind) -> Result<RemoteTransform, DispatchError> {
        kind.remote()
            .ok_or_else(|| DispatchError::UnknownGraphKind(kind.name().to_string()))
    }

    pub async fn dispatch(&self, kind: GraphKind, window: &[Sample]) -> Result<DerivedSeries, DispatchError> {
        let transform = Self::plan(kind)?;
        self.run(transform, window).await
    }

    pub async fn run(&self, transform: RemoteTransform, window: &[Sample]) -> Result<DerivedSeries, DispatchError> {
        let endpoint = transform.endpoint();
        let text = self.backend.post(endpoint, transform.request(window)).await?;

        let response = parse_response(&text)
            .map_err(|e| DispatchError::unavailable(endpoint, format!("invalid JSON: {}", e)))?;

        if let Some(err) = response.get("error").and_then(|e| e.as_str()) {
            return Err(DispatchError::unavailable(endpoint, err.to_string()));
        }

        let series = transform.reshape(&response, window)?;
        tracing::debug!(endpoint, points = series.len(), "transform resolved");
        Ok(series)
    }

    /// Submit `samples` to the diagnostics transform.
    pub async fn analyze(&self, samples: &[Sample]) -> Result<DiagnosticsReply, DispatchError> {
        let text = self
            .backend
            .post(ANALYZE_ENDPOINT, analyze_request(samples))
            .await?;

        let response = parse_response(&text)
            .map_err(|e| DispatchError::unavailable(ANALYZE_ENDPOINT, format!("invalid JSON: {}", e)))?;

        serde_json::from_value(response)
            .map_err(|e| DispatchError::unavailable(ANALYZE_ENDPOINT, format!("unexpected reply: {}", e)))
    }
}
