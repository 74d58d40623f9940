use std::{process, sync::Arc};
use tokio::{
    net::TcpListener,
    signal::unix::{self, SignalKind},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use fanlink::{
    api::{self, AppState},
    config::Config,
    error::Error,
    retry,
    tracing::{self, prelude::*},
    FanControl, UdpTransport,
};

#[tokio::main]
async fn main() {
    // Configuration errors are fatal before anything is opened.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fanlinkd: {}", Error::from(e));
            process::exit(2);
        }
    };

    if let Err(e) = tracing::init_logging(config.log_file.as_deref()) {
        eprintln!("fanlinkd: cannot open log file: {}", e);
        process::exit(2);
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Fatal error");
        process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        endpoint = %config.endpoint,
        attempts = config.retry.max_attempts,
        timeout_ms = retry::millis(config.retry.per_attempt_timeout),
        "Starting."
    );

    let transport = Arc::new(UdpTransport::open().await?);
    let fan = Arc::new(FanControl::new(transport, config.endpoint, config.retry));
    let listener = TcpListener::bind(config.api_listen).await?;

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();
    {
        let state = AppState::new(fan.clone());
        let running = running.clone();
        tracker.spawn(async move {
            if let Err(e) = api::serve(listener, state, running).await {
                error!(error = %e, "API server failed");
            }
        });
    }
    tracker.close();
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = tracker.wait() => warn!("API server exited unexpectedly."),
    }

    trace!("Shutting down.");
    running.cancel();
    fan.shutdown();

    tracker.wait().await;
    info!("Exiting.");
    Ok(())
}
