//! HTTP and WebSocket surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, connection limit, shutdown)
//!     → websocket.rs (upgrade, per-socket reader and writer)
//!     → pairing::SessionCoordinator
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer, ServerError};
