//! # relay-client
//!
//! Typed async client for the relay's HTTP API, used by agents (and the CLI)
//! to register, exchange messages and poll their queue.
//!
//! ```rust,ignore
//! let client = RelayClient::new("http://127.0.0.1:4000", "secret");
//! client.register("alice").await?;
//! let mut poller = UpdatePoller::new(client.clone(), "alice");
//! for update in poller.poll().await? {
//!     println!("{:?}", update.message.text());
//! }
//! ```

use relay_core::api::{
    AckResponse, AgentRequest, ChatActionRequest, ErrorResponse, HealthResponse,
    HeartbeatResponse, RegisterResponse, SendMessageRequest, SendMessageResponse, UpdatesResponse,
};
use relay_core::{AgentId, ChatId, Envelope, RelayError, Result, UpdateId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client for one relay.
#[derive(Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register `agent_id`. Returns every agent currently connected.
    pub async fn register(&self, agent_id: &str) -> Result<Vec<AgentId>> {
        let resp: RegisterResponse = self
            .post("/register", &agent_request(agent_id), agent_id)
            .await?;
        Ok(resp.connected_agents)
    }

    pub async fn unregister(&self, agent_id: &str) -> Result<()> {
        let _: AckResponse = self
            .post("/unregister", &agent_request(agent_id), agent_id)
            .await?;
        Ok(())
    }

    /// Send a heartbeat. Returns true when the relay had to auto-register
    /// the agent (it had been evicted or never registered).
    pub async fn heartbeat(&self, agent_id: &str) -> Result<bool> {
        let resp: HeartbeatResponse = self
            .post("/heartbeat", &agent_request(agent_id), agent_id)
            .await?;
        Ok(resp.auto_registered.unwrap_or(false))
    }

    pub async fn send_message(
        &self,
        agent_id: &str,
        chat_id: ChatId,
        text: &str,
    ) -> Result<SendMessageResponse> {
        let body = SendMessageRequest {
            agent_id: agent_id.to_string(),
            chat_id: Some(chat_id),
            text: text.to_string(),
            telegram_message: None,
            token: None,
        };
        self.post("/sendMessage", &body, agent_id).await
    }

    /// Relay a structured message verbatim. `text` is still required by the
    /// relay and is used for logging on its side.
    pub async fn forward_message(
        &self,
        agent_id: &str,
        chat_id: ChatId,
        text: &str,
        message: serde_json::Value,
    ) -> Result<SendMessageResponse> {
        let body = SendMessageRequest {
            agent_id: agent_id.to_string(),
            chat_id: Some(chat_id),
            text: text.to_string(),
            telegram_message: Some(message),
            token: None,
        };
        self.post("/sendMessage", &body, agent_id).await
    }

    pub async fn send_chat_action(&self, agent_id: &str, chat_id: ChatId, action: &str) -> Result<()> {
        let body = ChatActionRequest {
            agent_id: agent_id.to_string(),
            chat_id: Some(chat_id),
            action: action.to_string(),
            token: None,
        };
        let _: AckResponse = self.post("/sendChatAction", &body, agent_id).await?;
        Ok(())
    }

    /// Drain the agent's queue, acknowledging everything below `offset`.
    pub async fn get_updates(&self, agent_id: &str, offset: UpdateId) -> Result<Vec<Envelope>> {
        let resp = self
            .http
            .get(format!("{}/getUpdates", self.base_url))
            .bearer_auth(&self.token)
            .query(&[("agent_id", agent_id.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(transport_error)?;
        let body: UpdatesResponse = decode(resp, agent_id).await?;
        Ok(body.messages)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp, "").await
    }

    pub async fn ping(&self) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(RelayError::Rejected {
                status: resp.status().as_u16(),
                message: "ping failed".into(),
            });
        }
        resp.text().await.map_err(transport_error)
    }

    async fn post<B, R>(&self, path: &str, body: &B, agent_id: &str) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(path, agent_id, "relay request");
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp, agent_id).await
    }
}

fn agent_request(agent_id: &str) -> AgentRequest {
    AgentRequest {
        agent_id: agent_id.to_string(),
        token: None,
    }
}

fn transport_error(err: reqwest::Error) -> RelayError {
    RelayError::Transport(err.to_string())
}

/// Decode a success body, or turn the uniform error body back into a
/// [`RelayError`].
async fn decode<R: DeserializeOwned>(resp: reqwest::Response, agent_id: &str) -> Result<R> {
    let status = resp.status();
    if status.is_success() {
        return resp.json::<R>().await.map_err(transport_error);
    }

    let message = match resp.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    Err(match status.as_u16() {
        401 => RelayError::Unauthorized,
        404 if !agent_id.is_empty() => RelayError::UnknownAgent(agent_id.to_string()),
        400 => RelayError::InvalidBody(message),
        code => RelayError::Rejected {
            status: code,
            message,
        },
    })
}

/// Polls one agent's queue, advancing the offset past everything returned.
pub struct UpdatePoller {
    client: RelayClient,
    agent_id: AgentId,
    offset: UpdateId,
}

impl UpdatePoller {
    pub fn new(client: RelayClient, agent_id: impl Into<AgentId>) -> Self {
        Self {
            client,
            agent_id: agent_id.into(),
            offset: 0,
        }
    }

    /// Offset the next poll will send.
    pub fn offset(&self) -> UpdateId {
        self.offset
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Fetch pending envelopes and acknowledge them on the next call.
    pub async fn poll(&mut self) -> Result<Vec<Envelope>> {
        let updates = self.client.get_updates(&self.agent_id, self.offset).await?;
        if let Some(last) = updates.iter().map(|e| e.update_id).max() {
            self.offset = self.offset.max(last + 1);
        }
        Ok(updates)
    }
}
