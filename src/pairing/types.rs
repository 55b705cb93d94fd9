//! Wire events and pairing vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::net::connection::ConnectionId;

/// Events a client sends over its socket, one JSON frame each:
/// `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ask to be paired with someone who wants the same focus length.
    StartMatching(StartMatching),
    /// The sender is leaving an active session.
    LeavingSession(PartnerRef),
    /// The sender finished the session.
    SessionComplete(PartnerRef),
    /// Legacy form of `leaving_session` carrying the bare partner id.
    NotifyLeaving(Option<String>),
}

/// Payload of `start_matching`. Both fields are optional on the wire.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StartMatching {
    #[serde(default)]
    pub focus_time: Option<Value>,
    /// Echoed to the partner; a non-string value is passed on as JSON text.
    #[serde(default)]
    pub username: Option<Value>,
}

impl StartMatching {
    pub fn display_name(&self) -> Option<String> {
        match &self.username {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Payload naming the partner a notification is addressed to.
///
/// Kept as a raw string so an unknown or garbled id is dropped quietly
/// instead of failing the whole frame.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PartnerRef {
    #[serde(default)]
    pub partner_id: Option<String>,
}

/// Events the server addresses to exactly one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once when the socket opens so the client learns its own id.
    Connected { connection_id: ConnectionId },
    MatchSuccess {
        partner_id: ConnectionId,
        partner_username: Option<String>,
    },
    MatchTimeout,
    PartnerLeft,
    PartnerComplete,
}

impl ServerEvent {
    /// Event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::MatchSuccess { .. } => "match_success",
            ServerEvent::MatchTimeout => "match_timeout",
            ServerEvent::PartnerLeft => "partner_left",
            ServerEvent::PartnerComplete => "partner_complete",
        }
    }
}

/// Grouping key for waiting requests.
///
/// Numbers compare by value, so `25` and `25.0` share a bucket. Any other
/// JSON value compares by its exact rendering: `"25"` is not `25`. A
/// missing or null value gets a bucket of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DurationKey {
    Unspecified,
    Exact(String),
}

impl DurationKey {
    pub fn from_focus_time(focus_time: Option<&Value>) -> Self {
        match focus_time {
            None | Some(Value::Null) => DurationKey::Unspecified,
            Some(Value::Number(n)) => DurationKey::Exact(numeric_key(n)),
            Some(value) => DurationKey::Exact(value.to_string()),
        }
    }
}

/// Canonical text for a JSON number: integral values render without a
/// fractional part whatever their wire form.
fn numeric_key(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

impl std::fmt::Display for DurationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationKey::Unspecified => f.write_str("unspecified"),
            DurationKey::Exact(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for DurationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity of one waiting request, keying its timeout task.
pub type Ticket = u64;

/// Lifecycle of a waiting request. `Waiting` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Waiting,
    Matched,
    TimedOut,
    Cancelled,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Waiting => "waiting",
            RequestState::Matched => "matched",
            RequestState::TimedOut => "timed_out",
            RequestState::Cancelled => "cancelled",
        }
    }
}
