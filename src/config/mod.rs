//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the [matching] section atomically
//!     → new start_matching requests use the new values
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a valid config
//! - Only the [matching] section is reloadable; listener and admin
//!   addresses need a restart
//! - Requests already waiting keep the timeout they were armed with

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, ListenerConfig, LogFormat, MatchingConfig, ObservabilityConfig, ServiceConfig,
};
