use console::style;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use relay_client::UpdatePoller;
use relay_config::RelayConfig;
use relay_core::{AgentId, ChatId, Envelope, EnvelopeKind, RelayError, UpdateId};

use super::client_for;

/// Register as `agent_id`, heartbeat and poll until Ctrl-C, then unregister.
pub(super) async fn cmd_join(config: RelayConfig, agent_id: AgentId) -> relay_core::Result<()> {
    let client = client_for(&config);
    let connected = client.register(&agent_id).await?;
    println!(
        "{} Joined {} as {} ({} agent(s) connected)",
        style("✓").green(),
        client.base_url(),
        style(&agent_id).bold(),
        connected.len()
    );
    println!("   Press Ctrl-C to leave.\n");

    let mut heartbeat = tokio::time::interval(Duration::from_secs(
        config.client.heartbeat_interval_secs.max(1),
    ));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    let mut poll = tokio::time::interval(Duration::from_millis(
        config.client.poll_interval_ms.max(50),
    ));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut poller = UpdatePoller::new(client.clone(), agent_id.clone());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = heartbeat.tick() => match client.heartbeat(&agent_id).await {
                Ok(true) => warn!(agent_id = %agent_id, "relay had dropped us; re-registered"),
                Ok(false) => debug!(agent_id = %agent_id, "heartbeat"),
                Err(e) => warn!(error = %e, "heartbeat failed"),
            },
            _ = poll.tick() => match poller.poll().await {
                Ok(updates) => {
                    for update in &updates {
                        println!("{}", render_envelope(update));
                    }
                }
                // Evicted between heartbeats; the next heartbeat re-registers.
                Err(RelayError::UnknownAgent(_)) => debug!("not registered, waiting for heartbeat"),
                Err(RelayError::Unauthorized) => return Err(RelayError::Unauthorized),
                Err(e) => warn!(error = %e, "poll failed"),
            },
        }
    }

    info!(agent_id = %agent_id, "leaving relay");
    match client.unregister(&agent_id).await {
        Ok(()) | Err(RelayError::UnknownAgent(_)) => {}
        Err(e) => warn!(error = %e, "unregister failed"),
    }
    println!("\n{} Left the relay.", style("✓").green());
    Ok(())
}

pub(super) async fn cmd_send(
    config: RelayConfig,
    agent_id: AgentId,
    chat_id: String,
    text: String,
) -> relay_core::Result<()> {
    let client = client_for(&config);
    let Ok(chat_id) = chat_id.parse::<ChatId>();
    let sent = client.send_message(&agent_id, chat_id, &text).await?;
    println!(
        "{} Sent #{} to {} agent(s)",
        style("✓").green(),
        sent.message_id,
        sent.recipients
    );
    Ok(())
}

pub(super) async fn cmd_poll(
    config: RelayConfig,
    agent_id: AgentId,
    offset: UpdateId,
    json: bool,
) -> relay_core::Result<()> {
    let client = client_for(&config);
    let updates = client.get_updates(&agent_id, offset).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updates)?);
        return Ok(());
    }

    if updates.is_empty() {
        println!("No pending updates for {agent_id}.");
        return Ok(());
    }
    for update in &updates {
        println!("{}", render_envelope(update));
    }
    if let Some(last) = updates.last() {
        println!(
            "\n{} Next offset: {}",
            style("→").dim(),
            last.update_id + 1
        );
    }
    Ok(())
}

/// One-line, human-readable form of an update.
fn render_envelope(envelope: &Envelope) -> String {
    let id = style(format!("#{}", envelope.update_id)).dim();
    match envelope.kind {
        EnvelopeKind::Message => format!(
            "{id} {}: {}",
            style(&envelope.sender).cyan().bold(),
            envelope.message.text().unwrap_or("<non-text message>")
        ),
        EnvelopeKind::AgentConnected | EnvelopeKind::AgentDisconnected => {
            let subject = envelope.subject.as_deref().unwrap_or("?");
            let verb = if envelope.kind == EnvelopeKind::AgentConnected {
                "joined"
            } else {
                "left"
            };
            format!("{id} {} {verb}", style(subject).yellow())
        }
    }
}
