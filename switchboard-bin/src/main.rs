#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::process::ExitCode;

use args::Args;
use clap::Parser;
use switchboard_config::Config;
use switchboard_server::Server;
use tokio_util::sync::CancellationToken;

/// Exit codes per spec.md §6: 0 success, 1 general error, 2 no engines
/// configured, 3 kill switch enabled at boot.
const EXIT_OK: u8 = 0;
const EXIT_GENERAL_ERROR: u8 = 1;
const EXIT_NO_ENGINES: u8 = 2;
const EXIT_KILL_SWITCH: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "switchboard exited with an error");
            ExitCode::from(EXIT_GENERAL_ERROR)
        }
    }
}

async fn run() -> anyhow::Result<u8> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.server.listen_address = listen;
    }

    let _telemetry_guard = switchboard_telemetry::init(config.telemetry.as_ref(), "info")?;

    tracing::info!(
        config_path = %args.config.display(),
        "starting switchboard"
    );

    if config.engines.upstreams.is_empty() {
        tracing::error!("no upstream engines configured");
        return Ok(EXIT_NO_ENGINES);
    }

    if args.check {
        if config.fault.kill_switch {
            tracing::warn!("kill switch enabled");
            return Ok(EXIT_KILL_SWITCH);
        }
        tracing::info!("configuration OK");
        return Ok(EXIT_OK);
    }

    let server = Server::new(config).await?;

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    server.serve(shutdown).await?;

    tracing::info!("switchboard stopped");
    Ok(EXIT_OK)
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
