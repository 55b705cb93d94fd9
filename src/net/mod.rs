//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade request
//!     → connection.rs (admission against max_connections, ConnectionId assigned)
//!     → http::websocket (frame loop for the connection's lifetime)
//!     → guard dropped on close, slot released
//! ```
//!
//! # Design Decisions
//! - Connection IDs come from a process-wide counter and are never reused
//! - Admission is refused (503) rather than queued once the limit is hit

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
