//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the pairing core (registry, engine, coordinator) from config
//! - Create the Axum router: `/ws` upgrade and `/health`
//! - Apply hot-reloaded `[matching]` settings
//! - Start the admin API on its own listener when enabled
//! - Drain open sockets on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::websocket::websocket_handler;
use crate::lifecycle::shutdown::{recv_shutdown, Shutdown};
use crate::lifecycle::signals::shutdown_signal;
use crate::net::connection::ConnectionTracker;
use crate::pairing::{
    CompletionHook, ConnectionRegistry, LogCompletionHook, MatchingEngine, SessionCoordinator,
    SharedMatchingConfig,
};

/// How long shutdown waits for socket tasks to finish.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub coordinator: SessionCoordinator,
    pub tracker: ConnectionTracker,
    pub shutdown: Shutdown,
    pub max_connections: usize,
}

impl AppState {
    pub fn new(config: &ServiceConfig, hook: Arc<dyn CompletionHook>) -> Self {
        let registry = ConnectionRegistry::new();
        let settings: SharedMatchingConfig = Arc::new(ArcSwap::from_pointee(config.matching.clone()));
        let engine = MatchingEngine::new(registry.clone(), settings);
        Self {
            coordinator: SessionCoordinator::new(registry, engine, hook),
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
            max_connections: config.listener.max_connections,
        }
    }

    pub fn settings(&self) -> &SharedMatchingConfig {
        self.coordinator.engine().settings()
    }
}

/// WebSocket server for the pairing service.
pub struct HttpServer {
    state: AppState,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server whose completion hook only logs.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_hook(config, Arc::new(LogCompletionHook))
    }

    pub fn with_hook(config: ServiceConfig, hook: Arc<dyn CompletionHook>) -> Self {
        let state = AppState::new(&config, hook);
        Self { state, config }
    }

    pub fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ws", get(websocket_handler))
            .route("/health", get(|| async { "ok" }))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    ///
    /// `config_updates` carries reloaded configurations; only their
    /// `[matching]` section takes effect.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.state.max_connections,
            timeout_secs = self.config.matching.timeout_secs,
            "Pairing server starting"
        );

        let settings = self.state.settings().clone();
        tokio::spawn(async move {
            while let Some(updated) = config_updates.recv().await {
                tracing::info!(
                    timeout_secs = updated.matching.timeout_secs,
                    complete_delay_ms = updated.matching.complete_delay_ms,
                    "Applying matching settings"
                );
                settings.store(Arc::new(updated.matching));
            }
        });

        if self.config.admin.enabled {
            let admin_addr = self.config.admin.bind_address.clone();
            let admin_router = setup_admin_router(self.state.clone(), &self.config.admin.api_key);
            let admin_listener = TcpListener::bind(&admin_addr).await?;
            tracing::info!(address = %admin_addr, "Admin API listening");

            let mut admin_shutdown = self.state.shutdown.subscribe();
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(async move { recv_shutdown(&mut admin_shutdown).await })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API failed");
                }
            });
        }

        let internal = self.state.shutdown.clone();
        let tracker = self.state.tracker.clone();
        let app = Self::build_router(self.state).into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = recv_shutdown(&mut shutdown) => {}
                    _ = shutdown_signal() => {}
                }
                internal.trigger();
            })
            .await?;

        if !tracker.wait_idle(DRAIN_DEADLINE).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Sockets still open after drain deadline"
            );
        }

        tracing::info!("Pairing server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
