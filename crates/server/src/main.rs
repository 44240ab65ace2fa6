//! geofresh daemon entry point.
//!
//! Loads configuration, installs the database left by a previous run, then
//! keeps it current on the release calendar until Ctrl-C.
//! SIGHUP asks for an immediate refresh.
//! Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use geofresh_client::{HttpTransport, RefreshSettings, Refresher, Scheduler, SchedulerHandle, TransportConfig};
use geofresh_core::{AppConfig, LookupService, MaxMindLoader, ReleaseSchedule, SystemClock};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let schedule = ReleaseSchedule::new(config.release_weekday()?);

    tracing::info!(
        base_url = config.base_url.as_deref().unwrap_or_default(),
        db_path = %config.db_path.display(),
        weekday = %schedule.weekday(),
        "Starting geofresh"
    );

    let service = Arc::new(LookupService::new());
    let transport = Arc::new(HttpTransport::new(TransportConfig::from(&config))?);
    let refresher = Refresher::new(
        RefreshSettings::from_config(&config)?,
        transport,
        Arc::new(MaxMindLoader),
        Arc::clone(&service),
    )?;

    if let Err(e) = refresher.boot_from_local().await {
        tracing::warn!(error = %e, "local database unusable, waiting for download");
    }

    let scheduler = Scheduler::new(refresher, schedule, Arc::new(SystemClock));
    spawn_hangup_listener(scheduler.handle());

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!(state = ?service.state(), "geofresh stopped");

    Ok(())
}

/// Trigger a refresh on every SIGHUP.
#[cfg(unix)]
fn spawn_hangup_listener(handle: SchedulerHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "failed to listen for SIGHUP, refreshes follow the calendar only");
            return;
        }
    };

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received, requesting database refresh");
            handle.trigger();
        }
    });
}

#[cfg(not(unix))]
fn spawn_hangup_listener(_handle: SchedulerHandle) {}
