//! Settings: built-in defaults, then an optional TOML file, then
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::BaseDirs;
use phasescope_analysis::GraphKind;
use phasescope_core::SessionConfig;
use serde::{Deserialize, Serialize};

pub const ENV_ANALYSIS_HOST: &str = "PHASESCOPE_ANALYSIS_HOST";
pub const ENV_ANALYSIS_PORT: &str = "PHASESCOPE_ANALYSIS_PORT";
pub const ENV_RELAY_HOST: &str = "PHASESCOPE_RELAY_HOST";
pub const ENV_RELAY_PORT: &str = "PHASESCOPE_RELAY_PORT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Endpoint {
    fn local(port: u16) -> Self {
        Self {
            host: default_host(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Poll `GET /data`.
    #[default]
    Pull,
    /// Follow the `/events` stream.
    Push,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSettings {
    #[serde(default)]
    pub graphs: Vec<GraphKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub mode: SourceMode,
    pub poll_interval_ms: u64,
    /// Tabs to create, in order; the first reuses the session's `Tab 1`.
    pub tabs: Vec<TabSettings>,
    pub diagnostics: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            mode: SourceMode::default(),
            poll_interval_ms: 1000,
            tabs: vec![TabSettings {
                graphs: vec![GraphKind::RawPhases],
            }],
            diagnostics: false,
        }
    }
}

impl ViewerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub relay: Endpoint,
    pub analysis: Endpoint,
    pub session: SessionConfig,
    pub viewer: ViewerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay: Endpoint::local(5001),
            analysis: Endpoint::local(5000),
            session: SessionConfig::default(),
            viewer: ViewerSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from the default location if it exists, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_path().filter(|p| p.exists()),
        };

        let mut settings = match file {
            Some(p) => {
                tracing::info!("Loading settings from {}", p.display());
                let text = std::fs::read_to_string(&p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                Self::from_toml(&text).with_context(|| format!("invalid settings in {}", p.display()))?
            }
            None => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Override hosts and ports from `lookup` (normally the process
    /// environment).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup(ENV_ANALYSIS_HOST) {
            self.analysis.host = host;
        }
        if let Some(port) = lookup(ENV_ANALYSIS_PORT) {
            self.analysis.port = parse_port(ENV_ANALYSIS_PORT, &port)?;
        }
        if let Some(host) = lookup(ENV_RELAY_HOST) {
            self.relay.host = host;
        }
        if let Some(port) = lookup(ENV_RELAY_PORT) {
            self.relay.port = parse_port(ENV_RELAY_PORT, &port)?;
        }
        Ok(())
    }
}

/// `<config_dir>/phasescope/phasescope.toml`
pub fn default_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("phasescope").join("phasescope.toml"))
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a port number, got {:?}", key, value))
}
