// Worker binary entry point
// Runs one dispatch and exits, or dispatches on a cron schedule until Ctrl+C

use anyhow::Result;
use chrono::Utc;
use common::bootstrap;
use common::config::Settings;
use common::pipeline::Dispatcher;
use common::schedule::DispatchSchedule;
use common::telemetry;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;

    info!("Starting feed dispatch worker");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    info!("Configuration loaded successfully");

    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    let dispatcher = bootstrap::init_dispatcher(&settings).await?;
    let schedule = bootstrap::init_schedule(&settings)?;

    let outcome = match schedule {
        None => run_once(&dispatcher).await,
        Some(schedule) => {
            run_scheduled(dispatcher, schedule).await;
            Ok(())
        }
    };

    telemetry::shutdown_tracer();
    outcome
}

/// Single invocation: the exit status reports success or failure
async fn run_once(dispatcher: &Dispatcher) -> Result<()> {
    let report = dispatcher.dispatch().await?;
    info!(
        title = ?report.item.title,
        remaining = report.remaining,
        "Dispatch complete"
    );
    Ok(())
}

/// Daemon mode: a failed tick is logged and the loop keeps going
async fn run_scheduled(dispatcher: Arc<Dispatcher>, schedule: DispatchSchedule) {
    info!(schedule = schedule.expression(), "Worker is running. Press Ctrl+C to shutdown gracefully");

    loop {
        let wait = match schedule.until_next(Utc::now()) {
            Ok(wait) => wait,
            Err(e) => {
                error!(error = %e, "No further dispatch time, stopping");
                return;
            }
        };
        info!(wait_seconds = wait.as_secs(), "Waiting for next dispatch");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
                return;
            }
        }

        // Failure is already logged and counted inside dispatch()
        let _ = dispatcher.dispatch().await;
    }
}
