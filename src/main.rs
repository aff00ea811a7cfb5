//! war-alert: polls feeds and the alerts API, keeps what the classifier
//! flags, and notifies every configured channel.
//!
//! Configuration comes from the environment (and `.env`). SIGTERM/SIGINT stop
//! the process, SIGUSR1 sends a test notification.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use war_alert::{logging, metrics, signals, EnvRegistry, Orchestrator, Pipeline, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; real environment wins.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env();
    logging::init(settings.log_format);

    if let Some(addr) = settings.metrics_listen {
        if let Err(e) = metrics::init(addr) {
            warn!(error = %format!("{e:#}"), "metrics exporter disabled");
        }
    }

    let pipeline = Pipeline::from_settings(&settings)?;

    let (tx, rx) = mpsc::channel(8);
    let _listener = signals::spawn_listener(tx)?;

    info!(
        feeds = settings.rss_urls.len(),
        alerts = settings.alerts.is_some(),
        interval_secs = settings.sleep_delay.as_secs(),
        store = %settings.tmp_dir.display(),
        "war-alert started"
    );

    Orchestrator::new(Arc::new(EnvRegistry), pipeline).run(rx).await?;

    info!("war-alert stopped");
    Ok(())
}
