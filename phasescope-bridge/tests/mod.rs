use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use phasescope_analysis::{AnalysisBackend, DispatchError, Dispatcher, GraphKind};
use phasescope_bridge::config::{Settings, SourceMode, ENV_ANALYSIS_PORT, ENV_RELAY_HOST};
use phasescope_bridge::viewer::{self, Viewer};
use phasescope_core::Profile;
use phasescope_io::{IngestionRelay, Sample};
use serde_json::Value;

struct FixedBackend;

#[async_trait]
impl AnalysisBackend for FixedBackend {
    async fn post(&self, _endpoint: &'static str, _body: Value) -> Result<String, DispatchError> {
        Ok(r#"{"frequencies":[0,1],"amplitudes":[1,2]}"#.to_string())
    }
}

fn reading(t: f64) -> Sample {
    Sample::new(1.0, 2.0, 3.0, 220.0, 221.0, 219.0).with_time(t)
}

// ============================================================================
// Settings Tests
// ============================================================================

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.relay.url(), "http://127.0.0.1:5001");
    assert_eq!(settings.analysis.url(), "http://127.0.0.1:5000");
    assert_eq!(settings.viewer.mode, SourceMode::Pull);
    assert_eq!(settings.viewer.poll_interval().as_millis(), 1000);
    assert_eq!(settings.session.window_capacity, 210);
    assert_eq!(settings.session.diagnostics.cooldown_ms, 10_100);
}

#[test]
fn test_settings_partial_toml() {
    let text = r#"
        [analysis]
        host = "192.168.1.72"
        port = 5050

        [relay]
        port = 6001

        [session]
        profile = "diagnostic"
        min_graph_samples = 3

        [session.diagnostics]
        threshold = 150

        [viewer]
        mode = "push"

        [[viewer.tabs]]
        graphs = ["Power", "Hodograph"]

        [[viewer.tabs]]
        graphs = ["vector-graph"]
    "#;

    let settings = Settings::from_toml(text).unwrap();
    assert_eq!(settings.analysis.url(), "http://192.168.1.72:5050");
    assert_eq!(settings.relay.addr(), "127.0.0.1:6001");
    assert_eq!(settings.session.profile, Profile::Diagnostic);
    assert_eq!(settings.session.min_graph_samples(), 3);
    assert_eq!(settings.session.diagnostics.threshold, 150);
    assert_eq!(settings.session.diagnostics.cooldown_ms, 10_100);
    assert_eq!(settings.viewer.mode, SourceMode::Push);
    assert_eq!(settings.viewer.tabs.len(), 2);
    assert_eq!(settings.viewer.tabs[0].graphs, vec![GraphKind::Power, GraphKind::Hodograph]);
    assert_eq!(settings.viewer.tabs[1].graphs, vec![GraphKind::VectorGraph]);
}

#[test]
fn test_settings_reject_unknown_graph_kind() {
    let text = r#"
        [[viewer.tabs]]
        graphs = ["Spectrogram"]
    "#;
    assert!(Settings::from_toml(text).is_err());
}

#[test]
fn test_env_overrides_file_values() {
    let mut settings = Settings::default();
    let env: HashMap<&str, &str> = [(ENV_ANALYSIS_PORT, "7000"), (ENV_RELAY_HOST, "0.0.0.0")].into();

    settings
        .apply_env(|key| env.get(key).map(|v| v.to_string()))
        .unwrap();
    assert_eq!(settings.analysis.port, 7000);
    assert_eq!(settings.analysis.host, "127.0.0.1");
    assert_eq!(settings.relay.addr(), "0.0.0.0:5001");
}

#[test]
fn test_env_rejects_bad_port() {
    let mut settings = Settings::default();
    let err = settings
        .apply_env(|key| (key == ENV_ANALYSIS_PORT).then(|| "fifty".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_ANALYSIS_PORT));
}

// ============================================================================
// Viewer Tests
// ============================================================================

fn two_tab_settings() -> Settings {
    let mut settings = Settings::from_toml(
        r#"
        [[viewer.tabs]]
        graphs = ["Phase Currents and Voltages", "RFFT"]

        [[viewer.tabs]]
        graphs = ["Power", "Hodograph"]
        "#,
    )
    .unwrap();
    settings.session.profile = Profile::Spectral;
    settings
}

#[tokio::test]
async fn test_viewer_waits_for_enough_samples() {
    let settings = two_tab_settings();
    let mut viewer = Viewer::with_dispatcher(&settings, Dispatcher::new(Arc::new(FixedBackend)))
        .await
        .unwrap();

    // Hodograph is not offered by the spectral profile and is dropped.
    assert_eq!(viewer.pending().len(), 3);
    let tabs = viewer.session().tabs().await;
    assert_eq!(tabs.len(), 2);
    assert!(tabs.iter().all(|t| t.graphs.is_empty()));

    viewer.on_sample(reading(0.0)).await;
    assert_eq!(viewer.pending().len(), 3);

    viewer.on_sample(reading(1.0)).await;
    assert!(viewer.pending().is_empty());

    let tabs = viewer.session().tabs().await;
    assert_eq!(tabs[0].name, "Tab 1");
    assert_eq!(tabs[0].graphs.len(), 2);
    assert_eq!(tabs[1].graphs.len(), 1);
    assert_eq!(tabs[1].graphs[0].kind, GraphKind::Power);
}

#[tokio::test]
async fn test_viewer_follows_in_process_relay() {
    let settings = two_tab_settings();
    let relay = Arc::new(IngestionRelay::new());
    let samples = viewer::local_source(relay.subscribe().await);
    let viewer = Viewer::with_dispatcher(&settings, Dispatcher::new(Arc::new(FixedBackend)))
        .await
        .unwrap();

    for t in 0..5 {
        relay.publish(reading(t as f64)).await;
    }
    relay.shutdown().await;

    // The source closes after shutdown, which ends the run.
    viewer.run(samples, std::future::pending::<()>()).await.unwrap();
}

#[tokio::test]
async fn test_diagnostics_refused_outside_diagnostic_profile() {
    let mut settings = two_tab_settings();
    settings.viewer.diagnostics = true;

    let result = Viewer::with_dispatcher(&settings, Dispatcher::new(Arc::new(FixedBackend))).await;
    assert!(result.is_err());
}
