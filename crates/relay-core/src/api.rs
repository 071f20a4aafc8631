//! HTTP wire types shared by the relay server and its clients.
//!
//! Request bodies use defaulted fields so that a missing field reaches the
//! handler and is reported through the uniform `{success:false, error}` shape
//! instead of a deserializer rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{AgentId, ChatId, Envelope, UpdateId};

/// Body of `/register`, `/unregister` and `/heartbeat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Body of `/sendMessage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub agent_id: AgentId,
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    #[serde(default)]
    pub text: String,
    /// Structured message to relay verbatim instead of a synthesized one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_message: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Body of `/sendChatAction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatActionRequest {
    #[serde(default)]
    pub agent_id: AgentId,
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Query string of `/getUpdates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatesQuery {
    #[serde(default)]
    pub agent_id: AgentId,
    /// `offset=` with no value counts as absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<UpdateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<UpdateId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("offset: {e}"))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub connected_agents: Vec<AgentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_registered: Option<bool>,
}

/// Plain acknowledgement (`/unregister`, `/sendChatAction`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message_id: UpdateId,
    pub recipients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub success: bool,
    pub messages: Vec<Envelope>,
}

/// Uniform failure body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Per-agent entry of the health document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDetails {
    pub agent_id: AgentId,
    pub registered_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub queue_length: usize,
    pub offset: UpdateId,
}

/// Body of `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agents: usize,
    pub agents_list: Vec<AgentId>,
    pub agents_details: Vec<AgentDetails>,
    /// Seconds since the relay started.
    pub uptime: u64,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
