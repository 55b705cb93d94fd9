//! Configuration file watcher for hot reload.
//!
//! Editors often emit several modify events per save, and most edits touch
//! only one section. The watcher therefore remembers the last accepted
//! config and forwards a reload only when the `[matching]` section actually
//! changed. Edits to sections that need a restart are logged and otherwise
//! ignored.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServiceConfig;

/// Decides which reloaded configs are worth forwarding.
#[derive(Debug)]
pub struct ReloadFilter {
    current: ServiceConfig,
}

impl ReloadFilter {
    pub fn new(current: ServiceConfig) -> Self {
        Self { current }
    }

    /// Returns the config to apply, or `None` when nothing reloadable changed.
    pub fn accept(&mut self, candidate: ServiceConfig) -> Option<ServiceConfig> {
        let restart_only = [
            ("listener", self.current.listener != candidate.listener),
            ("admin", self.current.admin != candidate.admin),
            ("observability", self.current.observability != candidate.observability),
        ];
        for (section, changed) in restart_only {
            if changed {
                tracing::warn!(section, "Config section changed; takes effect after restart");
            }
        }

        if self.current.matching == candidate.matching {
            return None;
        }
        tracing::info!(
            timeout_secs = candidate.matching.timeout_secs,
            complete_delay_ms = candidate.matching.complete_delay_ms,
            "Matching settings changed"
        );
        self.current = candidate.clone();
        Some(candidate)
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    filter: ReloadFilter,
    update_tx: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, seeded with the config already in use.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: ServiceConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                filter: ReloadFilter::new(current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. Keep the returned watcher alive for as long
    /// as updates should flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            filter,
            update_tx,
        } = self;
        let filter = Mutex::new(filter);
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&watched) {
                        Ok(candidate) => {
                            let accepted = match filter.lock() {
                                Ok(mut filter) => filter.accept(candidate),
                                Err(_) => None,
                            };
                            if let Some(config) = accepted {
                                let _ = update_tx.send(config);
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload config; keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
