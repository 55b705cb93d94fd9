//! End-to-end pairing over real WebSocket connections.

use std::time::{Duration, Instant};

use pairing_sdk::ServerEvent;
use serde_json::json;

mod common;
use common::{assert_silent, fast_config, matched_pair, start_server, PROMPT};

#[tokio::test]
async fn test_clients_with_same_duration_are_paired() {
    let server = start_server(fast_config()).await;
    let mut a = server.client().await;
    let mut b = server.client().await;
    assert_ne!(a.connection_id(), b.connection_id());

    a.start_matching(Some(json!(25)), Some("ada")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    b.start_matching(Some(json!(25)), Some("bo")).await.unwrap();

    assert_eq!(
        a.next_event_timeout(PROMPT).await.unwrap(),
        ServerEvent::MatchSuccess {
            partner_id: b.connection_id().to_string(),
            partner_username: Some("bo".into()),
        }
    );
    assert_eq!(
        b.next_event_timeout(PROMPT).await.unwrap(),
        ServerEvent::MatchSuccess {
            partner_id: a.connection_id().to_string(),
            partner_username: Some("ada".into()),
        }
    );

    // A match cancels the timeout: nothing more arrives past the deadline.
    assert_silent(&mut a, Duration::from_millis(1500)).await;
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_lone_request_times_out() {
    let server = start_server(fast_config()).await;
    let mut a = server.client().await;

    let started = Instant::now();
    a.start_matching(Some(json!(50)), None).await.unwrap();

    let event = a.next_event_timeout(Duration::from_secs(3)).await.unwrap();
    assert_eq!(event, ServerEvent::MatchTimeout);
    assert!(started.elapsed() >= Duration::from_millis(900));

    assert_silent(&mut a, Duration::from_millis(300)).await;
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_different_durations_never_pair() {
    let server = start_server(fast_config()).await;
    let mut a = server.client().await;
    let mut b = server.client().await;

    a.start_matching(Some(json!(25)), None).await.unwrap();
    b.start_matching(Some(json!(50)), None).await.unwrap();

    assert_eq!(a.next_event_timeout(Duration::from_secs(3)).await.unwrap(), ServerEvent::MatchTimeout);
    assert_eq!(b.next_event_timeout(Duration::from_secs(3)).await.unwrap(), ServerEvent::MatchTimeout);
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_leaving_session_reaches_partner() {
    let server = start_server(fast_config()).await;
    let (mut a, mut b) = matched_pair(&server, 25).await;

    let b_id = b.connection_id().to_string();
    a.leaving_session(&b_id).await.unwrap();
    assert_eq!(b.next_event_timeout(PROMPT).await.unwrap(), ServerEvent::PartnerLeft);

    let a_id = a.connection_id().to_string();
    b.notify_leaving(&a_id).await.unwrap();
    assert_eq!(a.next_event_timeout(PROMPT).await.unwrap(), ServerEvent::PartnerLeft);
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_session_complete_is_delayed() {
    let server = start_server(fast_config()).await;
    let (mut a, mut b) = matched_pair(&server, 25).await;

    let b_id = b.connection_id().to_string();
    let sent = Instant::now();
    a.session_complete(&b_id).await.unwrap();

    assert_eq!(b.next_event_timeout(PROMPT).await.unwrap(), ServerEvent::PartnerComplete);
    assert!(sent.elapsed() >= Duration::from_millis(90));
    assert_silent(&mut a, Duration::from_millis(200)).await;
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_reloaded_timeout_applies_to_new_requests() {
    let mut config = fast_config();
    config.matching.timeout_secs = 30;
    let server = start_server(config.clone()).await;

    config.matching.timeout_secs = 1;
    server.config_updates.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut a = server.client().await;
    a.start_matching(Some(json!(25)), None).await.unwrap();
    assert_eq!(a.next_event_timeout(Duration::from_secs(3)).await.unwrap(), ServerEvent::MatchTimeout);
    server.shutdown.trigger();
}

#[tokio::test]
async fn test_admin_api_reports_queues() {
    let mut config = fast_config();
    config.matching.timeout_secs = 30;
    config.admin.enabled = true;
    config.admin.api_key = "test-admin-key".into();
    config.admin.bind_address = "127.0.0.1:28511".into();
    let server = start_server(config).await;

    let mut a = server.client().await;
    a.start_matching(Some(json!(25)), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let admin = pairing_sdk::AdminClient::new("http://127.0.0.1:28511", "test-admin-key");
    let status = admin.status().await.unwrap();
    assert_eq!(status.status, "operational");
    assert_eq!(status.live_connections, 1);
    assert_eq!(status.waiting_requests, 1);
    assert_eq!(status.pending_timeouts, 1);
    assert_eq!(status.timeout_secs, 30);

    let queues = admin.queues().await.unwrap();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].bucket, "25");
    assert_eq!(queues[0].waiting, 1);

    let res = reqwest::Client::new()
        .get("http://127.0.0.1:28511/admin/status")
        .bearer_auth("wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = start_server(fast_config()).await;
    let body = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
    server.shutdown.trigger();
}
