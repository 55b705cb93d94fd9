//! Matchmaking core.
//!
//! # Data Flow
//! ```text
//! start_matching
//!     → engine.rs (lock bucket, match or wait)
//!         → bucket.rs (per-duration FIFO queues)
//!         → timeout.rs (cancellable expiry for unmatched requests)
//!         → registry.rs (direct send of match_success / match_timeout)
//!
//! leaving_session / session_complete / notify_leaving / disconnect
//!     → lifecycle.rs (partner-addressed routing, cleanup)
//!         → registry.rs (liveness check + send)
//!         → hooks.rs (completion hand-off, fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - All state is in memory; a restart forgets every waiting request
//! - A waiting request leaves its bucket exactly once: matched, timed out,
//!   or cancelled (disconnect, or superseded by a newer request)
//! - FIFO per bucket; no matching across buckets

pub mod bucket;
pub mod engine;
pub mod hooks;
pub mod lifecycle;
pub mod registry;
pub mod timeout;
pub mod types;

pub use engine::{MatchingEngine, SharedMatchingConfig};
pub use hooks::{CompletionHook, CompletionReport, LogCompletionHook};
pub use lifecycle::SessionCoordinator;
pub use registry::ConnectionRegistry;
pub use types::{ClientEvent, DurationKey, RequestState, ServerEvent};
