//! Session configuration and product profiles.

use std::time::Duration;

use phasescope_analysis::GraphKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_CAPACITY: usize = 210;
pub const DEFAULT_DIAGNOSTICS_THRESHOLD: usize = 200;
pub const DEFAULT_DIAGNOSTICS_COOLDOWN_MS: u64 = 10_100;

/// The two product configurations. They differ in which graph kinds are
/// offered, the minimum window size for adding a graph, and whether the
/// diagnostics scheduler exists at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Spectral,
    Diagnostic,
}

impl Profile {
    pub fn offers(self, kind: GraphKind) -> bool {
        match self {
            Profile::Spectral => !matches!(kind, GraphKind::Hodograph | GraphKind::VectorGraph),
            Profile::Diagnostic => kind != GraphKind::Wavelet,
        }
    }

    pub fn offered(self) -> impl Iterator<Item = GraphKind> {
        GraphKind::ALL.into_iter().filter(move |k| self.offers(*k))
    }

    pub fn default_min_graph_samples(self) -> usize {
        match self {
            Profile::Spectral => 2,
            Profile::Diagnostic => 0,
        }
    }

    pub fn supports_diagnostics(self) -> bool {
        self == Profile::Diagnostic
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Window length required before a cycle submits anything; also the
    /// number of trailing samples submitted.
    pub threshold: usize,
    /// Pause between the end of one cycle and the start of the next.
    pub cooldown_ms: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIAGNOSTICS_THRESHOLD,
            cooldown_ms: DEFAULT_DIAGNOSTICS_COOLDOWN_MS,
        }
    }
}

impl DiagnosticsConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub profile: Profile,
    pub window_capacity: usize,
    /// Overrides the profile's minimum when set.
    pub min_graph_samples: Option<usize>,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            min_graph_samples: None,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn min_graph_samples(&self) -> usize {
        self.min_graph_samples
            .unwrap_or_else(|| self.profile.default_min_graph_samples())
    }
}
