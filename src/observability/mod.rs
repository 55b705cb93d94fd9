//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pairing core, sockets, admin API produce:
//!     → logging.rs (structured log events, connection_id / partner_id / bucket fields)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
