use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use crate::SdkError;

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        connection_id: String,
    },
    MatchSuccess {
        partner_id: String,
        partner_username: Option<String>,
    },
    MatchTimeout,
    PartnerLeft,
    PartnerComplete,
}

/// One WebSocket connection to the pairing service.
pub struct PairingClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    connection_id: String,
}

impl PairingClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:5000/ws`) and wait for the
    /// server's `connected` greeting.
    pub async fn connect(url: &str) -> Result<Self, SdkError> {
        let (socket, _) = connect_async(url).await?;
        let mut client = Self {
            socket,
            connection_id: String::new(),
        };

        match client.next_event().await? {
            ServerEvent::Connected { connection_id } => {
                client.connection_id = connection_id;
                Ok(client)
            }
            other => Err(SdkError::Handshake(format!("{other:?}"))),
        }
    }

    /// The id other clients use to address this connection.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Ask to be paired. `focus_time` is sent as-is; `None` sends no value.
    pub async fn start_matching(
        &mut self,
        focus_time: Option<Value>,
        username: Option<&str>,
    ) -> Result<(), SdkError> {
        let mut data = serde_json::Map::new();
        if let Some(focus_time) = focus_time {
            data.insert("focus_time".into(), focus_time);
        }
        if let Some(username) = username {
            data.insert("username".into(), Value::from(username));
        }
        self.emit("start_matching", Value::Object(data)).await
    }

    pub async fn leaving_session(&mut self, partner_id: &str) -> Result<(), SdkError> {
        self.emit("leaving_session", json!({ "partner_id": partner_id }))
            .await
    }

    pub async fn session_complete(&mut self, partner_id: &str) -> Result<(), SdkError> {
        self.emit("session_complete", json!({ "partner_id": partner_id }))
            .await
    }

    /// Legacy leave notification carrying the bare partner id.
    pub async fn notify_leaving(&mut self, partner_id: &str) -> Result<(), SdkError> {
        self.emit("notify_leaving", Value::from(partner_id)).await
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), SdkError> {
        self.socket.send(Message::text(text)).await?;
        Ok(())
    }

    /// Wait for the next server event, skipping control frames.
    pub async fn next_event(&mut self) -> Result<ServerEvent, SdkError> {
        loop {
            let message = match self.socket.next().await {
                Some(message) => message?,
                None => return Err(SdkError::Closed),
            };
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Binary(data) => return Ok(serde_json::from_slice(&data)?),
                Message::Close(_) => return Err(SdkError::Closed),
                _ => continue,
            }
        }
    }

    /// Like [`next_event`](Self::next_event), giving up after `wait`.
    pub async fn next_event_timeout(&mut self, wait: Duration) -> Result<ServerEvent, SdkError> {
        tokio::time::timeout(wait, self.next_event())
            .await
            .map_err(|_| SdkError::Timeout)?
    }

    /// Close the socket politely.
    pub async fn close(mut self) -> Result<(), SdkError> {
        self.socket.close(None).await?;
        Ok(())
    }

    async fn emit(&mut self, event: &str, data: Value) -> Result<(), SdkError> {
        let frame = json!({ "event": event, "data": data });
        self.send_raw(&frame.to_string()).await
    }
}
