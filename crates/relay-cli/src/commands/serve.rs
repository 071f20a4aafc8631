use relay_config::RelayConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the relay in the foreground until Ctrl-C.
pub(super) async fn cmd_serve(
    mut config: RelayConfig,
    listen: Option<String>,
) -> relay_core::Result<()> {
    if let Some(listen) = listen {
        config.server.listen = listen;
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    relay_server::start_server(config, shutdown).await?;
    info!("relay stopped");
    Ok(())
}
