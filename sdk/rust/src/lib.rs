//! Client SDK for the focus-pairing service.
//!
//! [`PairingClient`] speaks the WebSocket protocol; [`AdminClient`] reads
//! the admin API.

mod admin;
mod client;

pub use admin::{AdminClient, BucketDepth, SystemStatus};
pub use client::{PairingClient, ServerEvent};

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,

    #[error("timed out waiting for an event")]
    Timeout,

    #[error("expected `connected` as the first event, got `{0}`")]
    Handshake(String),
}
