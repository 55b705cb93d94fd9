//! Focus-session pairing service.
//!
//! Clients connect over WebSocket, ask to be paired for a focus duration,
//! and are matched first-come-first-served with another client asking for
//! the same duration. Unmatched requests time out; matched partners can
//! tell each other they left or finished.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pairing;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
