//! # PhaseScope IO
//!
//! The Telemetry Bridge.
//! Receives three-phase readings pushed by the measuring device and relays
//! them to every connected viewer, either as a live push stream or as a
//! "latest sample" pull endpoint.

pub mod client;
pub mod relay;
pub mod sample;
pub mod server;

pub use client::RelayClient;
pub use relay::{IngestionRelay, PublishOutcome, Subscription};
pub use sample::{Channel, ParseError, Sample};
