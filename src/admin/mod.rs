//! Read-only admin API.
//!
//! Served on its own listener, behind a bearer token.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::{get_queues, get_status};
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState, api_key: &str) -> Router {
    let api_key: Arc<str> = Arc::from(api_key);
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/queues", get(get_queues))
        .with_state(state)
        .layer(middleware::from_fn_with_state(api_key, admin_auth_middleware))
}
