//! Completion hand-off to the host application.
//!
//! When a client reports `session_complete`, the host may want to persist
//! session counts or credit rewards. That work is outside the pairing core:
//! the coordinator spawns the hook and never waits for it.

use futures_util::future::BoxFuture;

use crate::net::connection::ConnectionId;

/// What the hook learns about a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    /// Connection that reported completion.
    pub connection_id: ConnectionId,
    /// Partner it named, if the id was well-formed.
    pub partner_id: Option<ConnectionId>,
}

/// Receives completed sessions.
pub trait CompletionHook: Send + Sync + std::fmt::Debug {
    fn session_completed(&self, report: CompletionReport) -> BoxFuture<'static, ()>;
}

/// Default hook: records the completion in the log and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCompletionHook;

impl CompletionHook for LogCompletionHook {
    fn session_completed(&self, report: CompletionReport) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tracing::info!(
                connection_id = %report.connection_id,
                partner_id = ?report.partner_id.map(|id| id.to_string()),
                "Session completed"
            );
        })
    }
}
