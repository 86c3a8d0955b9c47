use phasescope_analysis::GraphKind;
use thiserror::Error;

use crate::board::TabId;
use crate::config::Profile;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// The window is below the minimum needed to add a graph.
    #[error("not enough data to add a graph: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("no tab with id {0}")]
    UnknownTab(TabId),

    #[error("{kind} is not offered by the {profile:?} profile")]
    KindNotOffered { kind: GraphKind, profile: Profile },

    #[error("diagnostics are not available in the {0:?} profile")]
    DiagnosticsUnavailable(Profile),
}
