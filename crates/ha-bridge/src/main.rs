mod assets;
mod cli;
mod config;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use session_log::{EventSink, SessionEvent, SessionEventKind};
use ws_relay::{RelayConfig, RelayServer, TargetPolicy};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref listen) = cli.listen {
        cfg.relay.listen_addr = listen.clone();
    }
    if let Some(ref listen) = cli.assets_listen {
        cfg.assets.listen_addr = listen.clone();
    }
    if let Some(ref root) = cli.assets_root {
        cfg.assets.root = root.clone();
    }
    if let Some(ref path) = cli.session_log {
        cfg.logging.session_log_path = path.clone();
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(
        config_file = %cli.config.display(),
        relay = %cfg.relay.listen_addr,
        assets = %cfg.assets.listen_addr,
        "ha-bridge starting"
    );

    // 4. Start the session event log.
    let (events, _events_handle) = EventSink::start(&cfg.logging.session_log_path)
        .await
        .context("failed to start session log")?;

    events
        .log(SessionEvent::new(
            SessionEventKind::ProcessStarted,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config_file": cli.config.display().to_string(),
            }),
        ))
        .await;

    // 5. Set up shutdown signal (ctrl_c + SIGTERM).
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (ctrl-c)");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT (ctrl-c)");
        }

        let _ = shutdown_tx_signal.send(());
    });

    // 6. Bind the relay.
    let relay_addr: SocketAddr = cfg
        .relay
        .listen_addr
        .parse()
        .context("invalid relay listen address")?;
    let assets_addr: SocketAddr = cfg
        .assets
        .listen_addr
        .parse()
        .context("invalid asset server listen address")?;

    let relay_config = RelayConfig {
        listen_addr: relay_addr,
        endpoint_path: cfg.relay.endpoint_path.clone(),
        policy: TargetPolicy::allow_hosts(cfg.relay.allowed_hosts.clone()),
        dial_timeout: Duration::from_secs(cfg.relay.dial_timeout_secs),
        idle_timeout: cfg.relay.idle_timeout_secs.map(Duration::from_secs),
        events: events.clone(),
    };
    let relay = RelayServer::bind(relay_config).await?;

    // 7. Run relay and asset server until either exits or shutdown is
    //    signalled.
    let mut shutdown_rx = shutdown_tx.subscribe();

    let result = tokio::select! {
        r = relay.run() => {
            info!("relay exited");
            r
        }
        r = assets::serve(assets_addr, cfg.assets.root.clone()) => {
            info!("asset server exited");
            r
        }
        _ = shutdown_rx.recv() => {
            info!("shutdown signal received");
            Ok(())
        }
    };

    // 8. Log shutdown.
    info!("ha-bridge shutting down");

    events
        .log(SessionEvent::new(
            SessionEventKind::ProcessStopped,
            serde_json::json!({
                "result": format!("{:?}", result),
            }),
        ))
        .await;

    result
}
