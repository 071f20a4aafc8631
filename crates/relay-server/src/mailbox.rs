//! In-memory agent registry and per-agent FIFO queues.
//!
//! Every operation takes `now` explicitly so the inactivity sweep can be
//! driven deterministically. The mailbox itself is not synchronized; the
//! server keeps it behind a single lock so each request mutates it atomically.

use chrono::{DateTime, Duration, Utc};
use relay_core::api::AgentDetails;
use relay_core::{
    AgentId, ChatId, ChatMessage, Envelope, EnvelopeKind, Payload, RELAY_SENDER, RelayError,
    UpdateId,
};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Outcome of a registration or heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The agent was not known and a record was created.
    Created,
    /// The agent was already registered; only `last_seen` changed.
    Refreshed,
}

/// Result of fanning out one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub update_id: UpdateId,
    pub recipients: usize,
}

#[derive(Debug)]
struct AgentRecord {
    registered_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    /// Highest offset the agent has acknowledged.
    offset: UpdateId,
    queue: VecDeque<Envelope>,
}

impl AgentRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            registered_at: now,
            last_seen: now,
            offset: 0,
            queue: VecDeque::new(),
        }
    }
}

/// Registry of connected agents and their pending envelopes.
#[derive(Debug)]
pub struct Mailbox {
    agents: BTreeMap<AgentId, AgentRecord>,
    next_update_id: UpdateId,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            agents: BTreeMap::new(),
            next_update_id: 1,
        }
    }

    /// Register `agent_id`, or refresh it if it is already known.
    ///
    /// A newly created agent is announced to every other agent with an
    /// `agent_connected` notice.
    pub fn register(&mut self, agent_id: &str, now: DateTime<Utc>) -> Registration {
        if let Some(record) = self.agents.get_mut(agent_id) {
            record.last_seen = now;
            debug!(agent_id, "agent re-registered");
            return Registration::Refreshed;
        }

        self.agents.insert(agent_id.to_string(), AgentRecord::new(now));
        let delivery = self.broadcast_notice(agent_id, EnvelopeKind::AgentConnected, now);
        info!(
            agent_id,
            update_id = delivery.update_id,
            agents = self.agents.len(),
            "agent registered"
        );
        Registration::Created
    }

    /// Remove `agent_id` and its queue, announcing the departure.
    pub fn unregister(&mut self, agent_id: &str, now: DateTime<Utc>) -> relay_core::Result<()> {
        if self.agents.remove(agent_id).is_none() {
            return Err(RelayError::UnknownAgent(agent_id.to_string()));
        }
        self.broadcast_notice(agent_id, EnvelopeKind::AgentDisconnected, now);
        info!(agent_id, agents = self.agents.len(), "agent unregistered");
        Ok(())
    }

    /// Refresh `last_seen`, registering the agent if it is unknown.
    pub fn heartbeat(&mut self, agent_id: &str, now: DateTime<Utc>) -> Registration {
        let registration = self.register(agent_id, now);
        if registration == Registration::Created {
            info!(agent_id, "heartbeat from unknown agent, auto-registered");
        }
        registration
    }

    /// Refresh `last_seen` of a known agent. Returns false for unknown agents.
    pub fn touch(&mut self, agent_id: &str, now: DateTime<Utc>) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(record) => {
                record.last_seen = now;
                true
            }
            None => false,
        }
    }

    /// Fan a chat message out to every agent except the sender.
    ///
    /// `structured` is relayed verbatim when present; otherwise a text message
    /// is synthesized from `chat_id` and `text`. Nothing is enqueued unless the
    /// sender is registered.
    pub fn send_message(
        &mut self,
        agent_id: &str,
        chat_id: ChatId,
        text: &str,
        structured: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> relay_core::Result<Delivery> {
        if !self.touch(agent_id, now) {
            return Err(RelayError::UnknownAgent(agent_id.to_string()));
        }

        let update_id = self.allocate_update_id();
        let message = match structured {
            Some(value) => Payload::from_value(value),
            None => Payload::Chat(ChatMessage::text(
                update_id as i64,
                agent_id,
                chat_id.clone(),
                text,
                now,
            )),
        };
        let envelope = Envelope {
            update_id,
            kind: EnvelopeKind::Message,
            sender: agent_id.to_string(),
            subject: None,
            message,
        };
        let recipients = self.enqueue_except(agent_id, envelope);
        debug!(agent_id, %chat_id, update_id, recipients, "message relayed");
        Ok(Delivery {
            update_id,
            recipients,
        })
    }

    /// Drain the agent's queue.
    ///
    /// Envelopes with `update_id < offset` are treated as acknowledged and
    /// discarded; the rest are returned in FIFO order. Either way the queue is
    /// empty afterwards.
    pub fn take_updates(
        &mut self,
        agent_id: &str,
        offset: UpdateId,
        now: DateTime<Utc>,
    ) -> relay_core::Result<Vec<Envelope>> {
        // An agent cannot acknowledge ids that have not been issued yet.
        let acknowledged = offset.min(self.next_update_id);
        let record = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| RelayError::UnknownAgent(agent_id.to_string()))?;

        record.last_seen = now;
        record.offset = record.offset.max(acknowledged);
        let updates: Vec<Envelope> = record
            .queue
            .drain(..)
            .filter(|envelope| envelope.update_id >= offset)
            .collect();
        if !updates.is_empty() {
            debug!(agent_id, offset, count = updates.len(), "updates delivered");
        }
        Ok(updates)
    }

    /// Evict every agent whose last activity is older than `timeout`, and
    /// announce each eviction to the agents that remain.
    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<AgentId> {
        let stale: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|(_, record)| now - record.last_seen > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for agent_id in &stale {
            self.agents.remove(agent_id);
        }
        for agent_id in &stale {
            info!(agent_id = %agent_id, "evicting inactive agent");
            self.broadcast_notice(agent_id, EnvelopeKind::AgentDisconnected, now);
        }
        stale
    }

    /// Registered agent ids in sorted order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of envelopes waiting for `agent_id`.
    pub fn queue_len(&self, agent_id: &str) -> Option<usize> {
        self.agents.get(agent_id).map(|r| r.queue.len())
    }

    /// Envelopes waiting across all queues.
    pub fn queued_total(&self) -> usize {
        self.agents.values().map(|r| r.queue.len()).sum()
    }

    /// Id the next envelope will receive.
    pub fn next_update_id(&self) -> UpdateId {
        self.next_update_id
    }

    /// Per-agent snapshot for the health document.
    pub fn details(&self) -> Vec<AgentDetails> {
        self.agents
            .iter()
            .map(|(id, record)| AgentDetails {
                agent_id: id.clone(),
                registered_at: record.registered_at,
                last_seen: record.last_seen,
                queue_length: record.queue.len(),
                offset: record.offset,
            })
            .collect()
    }

    fn allocate_update_id(&mut self) -> UpdateId {
        let id = self.next_update_id;
        self.next_update_id += 1;
        id
    }

    fn broadcast_notice(
        &mut self,
        subject: &str,
        kind: EnvelopeKind,
        now: DateTime<Utc>,
    ) -> Delivery {
        let update_id = self.allocate_update_id();
        let verb = match kind {
            EnvelopeKind::AgentDisconnected => "disconnected",
            _ => "connected",
        };
        let envelope = Envelope {
            update_id,
            kind,
            sender: RELAY_SENDER.to_string(),
            subject: Some(subject.to_string()),
            message: Payload::Chat(ChatMessage::notice(
                update_id as i64,
                format!("Agent {subject} {verb}"),
                now,
            )),
        };
        let recipients = self.enqueue_except(subject, envelope);
        Delivery {
            update_id,
            recipients,
        }
    }

    fn enqueue_except(&mut self, excluded: &str, envelope: Envelope) -> usize {
        let mut recipients = 0;
        for (id, record) in self.agents.iter_mut() {
            if id == excluded {
                continue;
            }
            record.queue.push_back(envelope.clone());
            recipients += 1;
        }
        recipients
    }
}
