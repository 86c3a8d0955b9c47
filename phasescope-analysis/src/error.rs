use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The service could not be reached, answered with a non-success
    /// status, or answered with something that does not fit the kind.
    #[error("transform {endpoint} unavailable: {reason}")]
    TransformUnavailable { endpoint: &'static str, reason: String },

    /// No remote endpoint exists for the requested kind.
    #[error("unknown graph kind: {0}")]
    UnknownGraphKind(String),
}

impl DispatchError {
    pub(crate) fn unavailable(endpoint: &'static str, reason: impl Into<String>) -> Self {
        DispatchError::TransformUnavailable {
            endpoint,
            reason: reason.into(),
        }
    }
}
