//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown requested
//!
//! Shutdown (shutdown.rs):
//!     trigger → stop accepting → close sockets (waiting requests cancelled)
//!             → wait for socket tasks to drain → exit
//! ```
//!
//! # Design Decisions
//! - Draining has a deadline; stragglers are abandoned after it
//! - Pairing state is in memory only, so nothing is flushed on exit

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
