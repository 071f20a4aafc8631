use chrono::TimeDelta;
use relay_config::{MAX_TIMING_SECS, MailboxConfig};
use relay_core::AgentId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AppState;

/// Run one inactivity sweep against the shared mailbox.
pub fn sweep_once(state: &AppState, timeout: TimeDelta) -> Vec<AgentId> {
    let evicted = state.mailbox.lock().sweep(chrono::Utc::now(), timeout);
    if !evicted.is_empty() {
        state.metrics.add_evictions(evicted.len());
        info!(count = evicted.len(), agents = ?evicted, "evicted inactive agents");
    }
    evicted
}

/// Inactivity timeout as a chrono delta. Out-of-range values saturate instead
/// of panicking.
pub fn agent_timeout(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Spawn the periodic sweeper. It stops when `cancel` fires.
pub fn spawn_sweeper(
    state: Arc<AppState>,
    config: &MailboxConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = Duration::from_secs(config.sweep_interval_secs.clamp(1, MAX_TIMING_SECS));
    let timeout = agent_timeout(config.agent_timeout_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    sweep_once(&state, timeout);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::ServerConfig;

    #[test]
    fn test_agent_timeout_saturates() {
        assert_eq!(agent_timeout(300), TimeDelta::seconds(300));
        assert_eq!(agent_timeout(u64::MAX), TimeDelta::MAX);
        assert_eq!(agent_timeout(i64::MAX as u64), TimeDelta::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_idle_agents_and_stops_on_cancel() {
        let state = AppState::new(ServerConfig::default());
        {
            let mut mailbox = state.mailbox.lock();
            let idle_since = chrono::Utc::now() - TimeDelta::seconds(600);
            mailbox.register("idle", idle_since);
            mailbox.register("active", chrono::Utc::now() + TimeDelta::seconds(600));
        }
        let config = MailboxConfig {
            agent_timeout_secs: 300,
            sweep_interval_secs: 60,
        };
        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(state.clone(), &config, cancel.clone());

        // Let the task consume its immediate first tick, then pass one period.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(state.mailbox.lock().agent_ids(), vec!["active".to_string()]);
        assert!(
            state
                .metrics
                .render_prometheus(0, 0)
                .contains("relay_evictions_total 1")
        );

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
