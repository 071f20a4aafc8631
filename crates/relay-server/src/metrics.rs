//! Prometheus-compatible metrics for the relay.
//!
//! Tracks request counts, membership churn and envelope throughput.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global metrics registry.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    /// 4xx + 5xx responses.
    http_errors_total: AtomicU64,
    auth_failures_total: AtomicU64,
    registrations_total: AtomicU64,
    unregistrations_total: AtomicU64,
    evictions_total: AtomicU64,
    messages_sent_total: AtomicU64,
    /// One per recipient queue an envelope was appended to.
    envelopes_enqueued_total: AtomicU64,
    envelopes_delivered_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                http_errors_total: AtomicU64::new(0),
                auth_failures_total: AtomicU64::new(0),
                registrations_total: AtomicU64::new(0),
                unregistrations_total: AtomicU64::new(0),
                evictions_total: AtomicU64::new(0),
                messages_sent_total: AtomicU64::new(0),
                envelopes_enqueued_total: AtomicU64::new(0),
                envelopes_delivered_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_http_errors(&self) {
        self.inner.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_failures(&self) {
        self.inner
            .auth_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_registrations(&self) {
        self.inner
            .registrations_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unregistrations(&self) {
        self.inner
            .unregistrations_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evictions(&self, count: usize) {
        self.inner
            .evictions_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record one relayed message and the number of queues it reached.
    pub fn record_message(&self, recipients: usize) {
        self.inner
            .messages_sent_total
            .fetch_add(1, Ordering::Relaxed);
        self.inner
            .envelopes_enqueued_total
            .fetch_add(recipients as u64, Ordering::Relaxed);
    }

    pub fn add_delivered(&self, count: usize) {
        self.inner
            .envelopes_delivered_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Render metrics in Prometheus text exposition format. Gauges describing
    /// mailbox state are passed in by the caller.
    pub fn render_prometheus(&self, agents: usize, queued: usize) -> String {
        let m = &self.inner;
        format!(
            r#"# HELP relay_uptime_seconds Time since the relay started.
# TYPE relay_uptime_seconds gauge
relay_uptime_seconds {}

# HELP relay_agents Currently registered agents.
# TYPE relay_agents gauge
relay_agents {}

# HELP relay_queued_envelopes Envelopes waiting across all agent queues.
# TYPE relay_queued_envelopes gauge
relay_queued_envelopes {}

# HELP relay_http_requests_total Total HTTP requests served.
# TYPE relay_http_requests_total counter
relay_http_requests_total {}

# HELP relay_http_errors_total Total HTTP errors (4xx/5xx).
# TYPE relay_http_errors_total counter
relay_http_errors_total {}

# HELP relay_auth_failures_total Requests rejected for a missing or wrong token.
# TYPE relay_auth_failures_total counter
relay_auth_failures_total {}

# HELP relay_registrations_total Agents registered (explicitly or by heartbeat).
# TYPE relay_registrations_total counter
relay_registrations_total {}

# HELP relay_unregistrations_total Agents that unregistered themselves.
# TYPE relay_unregistrations_total counter
relay_unregistrations_total {}

# HELP relay_evictions_total Agents evicted for inactivity.
# TYPE relay_evictions_total counter
relay_evictions_total {}

# HELP relay_messages_sent_total Chat messages accepted for relay.
# TYPE relay_messages_sent_total counter
relay_messages_sent_total {}

# HELP relay_envelopes_enqueued_total Message envelopes appended to recipient queues.
# TYPE relay_envelopes_enqueued_total counter
relay_envelopes_enqueued_total {}

# HELP relay_envelopes_delivered_total Envelopes returned by getUpdates.
# TYPE relay_envelopes_delivered_total counter
relay_envelopes_delivered_total {}
"#,
            self.uptime_secs(),
            agents,
            queued,
            m.http_requests_total.load(Ordering::Relaxed),
            m.http_errors_total.load(Ordering::Relaxed),
            m.auth_failures_total.load(Ordering::Relaxed),
            m.registrations_total.load(Ordering::Relaxed),
            m.unregistrations_total.load(Ordering::Relaxed),
            m.evictions_total.load(Ordering::Relaxed),
            m.messages_sent_total.load(Ordering::Relaxed),
            m.envelopes_enqueued_total.load(Ordering::Relaxed),
            m.envelopes_delivered_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
