use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use phasescope_bridge::config::{Settings, SourceMode};
use phasescope_bridge::viewer::{self, Viewer};
use phasescope_io::{IngestionRelay, RelayClient};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phasescope", version, about = "Three-phase telemetry relay and viewer")]
struct Cli {
    /// Settings file (defaults to <config_dir>/phasescope/phasescope.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept device pushes and fan them out to viewers
    Relay,
    /// Follow a remote relay and keep graphs up to date
    Viewer {
        /// Overrides the configured source mode
        #[arg(long, value_enum)]
        mode: Option<Mode>,
    },
    /// Relay and viewer in one process
    Run,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Mode {
    Pull,
    Push,
}

impl From<Mode> for SourceMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Pull => SourceMode::Pull,
            Mode::Push => SourceMode::Push,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Relay => run_relay(&settings).await,
        Commands::Viewer { mode } => {
            let mode = mode.map(SourceMode::from).unwrap_or(settings.viewer.mode);
            run_viewer(&settings, mode).await
        }
        Commands::Run => run_all(&settings).await,
    }
}

async fn run_relay(settings: &Settings) -> Result<()> {
    let listener = bind(settings).await?;
    let relay = Arc::new(IngestionRelay::new());
    phasescope_io::server::serve(listener, relay, shutdown_signal()).await
}

async fn run_viewer(settings: &Settings, mode: SourceMode) -> Result<()> {
    let client = RelayClient::new(&settings.relay.url());
    let (samples, source) =
        viewer::spawn_remote_source(client, mode, settings.viewer.poll_interval());

    let viewer = Viewer::new(settings).await?;
    let result = viewer.run(samples, shutdown_signal()).await;
    source.abort();
    result
}

async fn run_all(settings: &Settings) -> Result<()> {
    let listener = bind(settings).await?;
    let relay = Arc::new(IngestionRelay::new());
    let samples = viewer::local_source(relay.subscribe().await);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(phasescope_io::server::serve(listener, relay, async move {
        let _ = stop_rx.await;
    }));

    let viewer = Viewer::new(settings).await?;
    let result = viewer.run(samples, shutdown_signal()).await;

    let _ = stop_tx.send(());
    server.await.context("relay task panicked")??;
    result
}

async fn bind(settings: &Settings) -> Result<TcpListener> {
    let addr = settings.relay.addr();
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind relay on {}", addr))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
