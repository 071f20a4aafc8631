use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier an agent registers under.
pub type AgentId = String;

/// Global, strictly increasing envelope sequence number.
pub type UpdateId = u64;

/// Sender name used for notices generated by the relay itself.
pub const RELAY_SENDER: &str = "relay";

/// Telegram-style identifier: numeric (`-1001234`) or named (`@channel`).
/// Used for both chats and message authors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Numeric(i64),
    Named(String),
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatId::Numeric(id) => write!(f, "{id}"),
            ChatId::Named(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId::Numeric(id)
    }
}

impl From<&str> for ChatId {
    fn from(name: &str) -> Self {
        ChatId::Named(name.to_string())
    }
}

impl From<String> for ChatId {
    fn from(name: String) -> Self {
        ChatId::Named(name)
    }
}

impl std::str::FromStr for ChatId {
    type Err = std::convert::Infallible;

    /// Integers become [`ChatId::Numeric`], anything else is kept as a name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(id) => ChatId::Numeric(id),
            Err(_) => ChatId::Named(s.to_string()),
        })
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: ChatId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl ChatUser {
    /// The user record the relay attaches to messages authored by an agent.
    pub fn agent(agent_id: &str) -> Self {
        Self {
            id: ChatId::Named(agent_id.to_string()),
            is_bot: true,
            first_name: agent_id.to_string(),
            username: Some(agent_id.to_string()),
        }
    }
}

/// Chat a message belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A Telegram-shaped chat message, as synthesized by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChatUser>,
    pub chat: ChatRef,
    /// Unix seconds.
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChatMessage {
    /// Synthesize a plain text message authored by `agent_id`.
    pub fn text(
        message_id: i64,
        agent_id: &str,
        chat_id: ChatId,
        text: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            from: Some(ChatUser::agent(agent_id)),
            chat: ChatRef {
                id: chat_id,
                kind: "group".into(),
            },
            date: date.timestamp(),
            text: Some(text.into()),
        }
    }

    /// A notice authored by the relay itself (membership changes).
    pub fn notice(message_id: i64, text: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            message_id,
            from: Some(ChatUser {
                id: ChatId::Named(RELAY_SENDER.into()),
                is_bot: true,
                first_name: RELAY_SENDER.into(),
                username: None,
            }),
            chat: ChatRef {
                id: ChatId::Named(RELAY_SENDER.into()),
                kind: "system".into(),
            },
            date: date.timestamp(),
            text: Some(text.into()),
        }
    }
}

/// Payload carried by an envelope.
///
/// Anything read off the wire is kept as [`Payload::Raw`], so a forwarded
/// message reaches its recipients exactly as the sender wrote it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// A message synthesized by the relay.
    Chat(ChatMessage),
    /// Caller-supplied JSON, relayed verbatim.
    Raw(serde_json::Value),
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Payload::Raw)
    }
}

impl Payload {
    /// Wrap a caller-supplied structured message without reinterpreting it.
    pub fn from_value(value: serde_json::Value) -> Self {
        Payload::Raw(value)
    }

    /// Text of the message, if it has any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Chat(msg) => msg.text.as_deref(),
            Payload::Raw(value) => value.get("text").and_then(|t| t.as_str()),
        }
    }

    /// Typed view of the payload, when it has the chat message shape.
    pub fn to_chat(&self) -> Option<ChatMessage> {
        match self {
            Payload::Chat(msg) => Some(msg.clone()),
            Payload::Raw(value) => serde_json::from_value(value.clone()).ok(),
        }
    }

    /// The payload as plain JSON.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Payload::Chat(msg) => serde_json::to_value(msg).unwrap_or_default(),
            Payload::Raw(value) => value.clone(),
        }
    }
}

/// What an envelope represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Message,
    AgentConnected,
    AgentDisconnected,
}

/// One queued update. A single envelope (one `update_id`) is appended to the
/// queue of every recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub update_id: UpdateId,
    pub kind: EnvelopeKind,
    /// Agent that caused the envelope, or [`RELAY_SENDER`] for notices.
    pub sender: AgentId,
    /// For membership notices: the agent that joined or left.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<AgentId>,
    pub message: Payload,
}

impl Envelope {
    pub fn is_notice(&self) -> bool {
        self.kind != EnvelopeKind::Message
    }
}
