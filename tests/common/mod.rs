//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use focus_pairing::config::ServiceConfig;
use focus_pairing::http::HttpServer;
use focus_pairing::lifecycle::Shutdown;
use pairing_sdk::{PairingClient, ServerEvent};
use tokio::sync::mpsc;

/// Generous upper bound for events that should arrive "immediately".
pub const PROMPT: Duration = Duration::from_secs(2);

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<ServiceConfig>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn client(&self) -> PairingClient {
        PairingClient::connect(&self.ws_url()).await.unwrap()
    }
}

/// Config with a one-second match timeout.
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.matching.timeout_secs = 1;
    config
}

pub async fn start_server(config: ServiceConfig) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer {
        addr,
        shutdown,
        config_updates,
    }
}

/// Assert nothing arrives on `client` for `quiet`.
pub async fn assert_silent(client: &mut PairingClient, quiet: Duration) {
    if let Ok(event) = tokio::time::timeout(quiet, client.next_event()).await {
        panic!("expected no event, got {event:?}");
    }
}

/// Drive two fresh clients into a match and return them as (first, second).
pub async fn matched_pair(server: &TestServer, focus_time: u64) -> (PairingClient, PairingClient) {
    let mut a = server.client().await;
    let mut b = server.client().await;

    a.start_matching(Some(focus_time.into()), Some("ada")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    b.start_matching(Some(focus_time.into()), Some("bo")).await.unwrap();

    let for_a = a.next_event_timeout(PROMPT).await.unwrap();
    let for_b = b.next_event_timeout(PROMPT).await.unwrap();
    assert!(matches!(for_a, ServerEvent::MatchSuccess { .. }));
    assert!(matches!(for_b, ServerEvent::MatchSuccess { .. }));
    (a, b)
}
