use serde::{Deserialize, Serialize};

use crate::error::PresenceError;
use crate::store::StoredMessage;

/// Messages sent from client to server.
///
/// Frames look like `{"event": "joinInterest", "data": "507f1f77bcf86cd799439011"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Authenticate(String),
    JoinInterest(String),
    LeaveInterest(String),
    Typing(TypingPayload),
    Disconnect(String),
}

impl ClientMessage {
    /// Event name, for logging and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Authenticate(_) => "authenticate",
            ClientMessage::JoinInterest(_) => "joinInterest",
            ClientMessage::LeaveInterest(_) => "leaveInterest",
            ClientMessage::Typing(_) => "typing",
            ClientMessage::Disconnect(_) => "disconnect",
        }
    }
}

/// Typing indicator payload. Fields are optional on the wire so a missing
/// field is reported back to the client instead of failing to parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(default)]
    pub interest_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_typing: bool,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: String },
    RateLimitExceeded(String),
    ForceDisconnect(String),
    Error(String),
    #[serde(rename_all = "camelCase")]
    UserJoined { socket_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    UserLeft { socket_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: String,
        is_typing: bool,
        socket_id: String,
    },
    NewMessage {
        success: bool,
        message: serde_json::Value,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn new_message(message: &StoredMessage) -> Self {
        Self::NewMessage {
            success: true,
            message: serde_json::to_value(message).unwrap_or_default(),
        }
    }
}

impl From<&PresenceError> for ServerMessage {
    fn from(err: &PresenceError) -> Self {
        ServerMessage::error(err.to_string())
    }
}
