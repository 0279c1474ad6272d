//! rp-digest binary: wires configuration, the portal client, the Telegram
//! sink, the daily scheduler and the command listener together.

use rp_digest::bot::CommandListener;
use rp_digest::config::Config;
use rp_digest::orchestrator::Reporter;
use rp_digest::portal::PortalClient;
use rp_digest::telegram::TelegramSink;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> rp_digest::Result<()> {
    // A local .env is a convenience for development; absence is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().inspect_err(|e| error!(error = %e, "invalid configuration"))?;
    info!(
        portal = %config.portal.base_url,
        chat_id = config.telegram.chat_id,
        "rp-digest starting"
    );

    let portal = PortalClient::new(&config.portal)?;
    let sink = TelegramSink::new(&config.telegram, config.retry.clone())?;
    let reporter = Arc::new(Reporter::new(config.clone(), portal, sink));

    // One digest right away so a restart never silently skips a morning
    if let Err(e) = reporter.run_report_cycle(reporter.default_chat_id()).await {
        warn!(error = %e, "startup report cycle failed, continuing with the schedule");
    }

    let shutdown = CancellationToken::new();

    let scheduler = rp_digest::scheduler::DailyScheduler::new(
        reporter.clone(),
        config.report.report_time,
        config.report.timezone,
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let listener = CommandListener::new(
        &config.telegram.api_base,
        &config.telegram.token,
        reporter.clone(),
    )?;
    let listener_handle = tokio::spawn(listener.run(shutdown.clone()));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");
    shutdown.cancel();

    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "scheduler task did not stop cleanly");
    }
    if let Err(e) = listener_handle.await {
        warn!(error = %e, "command listener task did not stop cleanly");
    }

    info!("rp-digest stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "could not register SIGTERM handler, relying on Ctrl-C");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "could not wait for Ctrl-C");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "could not wait for Ctrl-C");
            }
        }
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "could not wait for Ctrl-C");
    }
}
