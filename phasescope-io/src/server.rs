//! HTTP surface of the relay.
//!
//! - `POST /data`   device push
//! - `GET  /data`   latest sample (pull variant), `null` before the first push
//! - `GET  /events` server-sent events, latest sample first

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::relay::IngestionRelay;
use crate::sample::Sample;

pub fn router(relay: Arc<IngestionRelay>) -> Router {
    Router::new()
        .route("/data", get(latest_sample).post(push_sample))
        .route("/events", get(sample_events))
        .with_state(relay)
}

/// Serve the relay until `shutdown` resolves, then tear the relay down.
///
/// The relay is released before axum drains connections: SSE streams only
/// end once their subscriber queue closes.
pub async fn serve<F>(listener: TcpListener, relay: Arc<IngestionRelay>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "relay listening");

    let relay_for_signal = relay.clone();
    let signal = async move {
        shutdown.await;
        relay_for_signal.shutdown().await;
    };

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(signal)
        .await
        .context("relay server failed")
}

async fn push_sample(State(relay): State<Arc<IngestionRelay>>, body: String) -> (StatusCode, &'static str) {
    match relay.ingest_raw(&body).await {
        Ok(_) => (StatusCode::OK, "Data received"),
        Err(_) => (StatusCode::BAD_REQUEST, "Malformed telemetry payload"),
    }
}

async fn latest_sample(State(relay): State<Arc<IngestionRelay>>) -> Json<Option<Sample>> {
    Json(relay.latest().await)
}

async fn sample_events(
    State(relay): State<Arc<IngestionRelay>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = relay.subscribe().await;
    let stream = ReceiverStream::new(subscription.into_receiver()).map(|sample| {
        let event = Event::default()
            .event("sample")
            .json_data(sample)
            .unwrap_or_else(|_| Event::default().comment("unserializable sample"));
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
