// src/metrics.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const CYCLES_TOTAL: &str = "war_alert_cycles_total";
pub const ITEMS_TOTAL: &str = "war_alert_items_total";
pub const DEDUP_DROPPED_TOTAL: &str = "war_alert_dedup_dropped_total";
pub const CLASSIFIER_REJECTED_TOTAL: &str = "war_alert_classifier_rejected_total";
pub const PIPELINE_ERRORS_TOTAL: &str = "war_alert_pipeline_errors_total";
pub const SOURCE_ERRORS_TOTAL: &str = "war_alert_source_errors_total";
pub const NOTIFICATIONS_TOTAL: &str = "war_alert_notifications_total";
pub const NOTIFY_ERRORS_TOTAL: &str = "war_alert_notify_errors_total";

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Without a recorder the counters are no-ops.
pub fn init(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    describe();
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

fn describe() {
    describe_counter!(CYCLES_TOTAL, Unit::Count, "Poll cycles started.");
    describe_counter!(ITEMS_TOTAL, Unit::Count, "Items fetched from all sources.");
    describe_counter!(DEDUP_DROPPED_TOTAL, Unit::Count, "Items dropped as already seen.");
    describe_counter!(
        CLASSIFIER_REJECTED_TOTAL,
        Unit::Count,
        "Items the classifier judged not noteworthy."
    );
    describe_counter!(
        PIPELINE_ERRORS_TOTAL,
        Unit::Count,
        "Items dropped because a stage failed (label: stage)."
    );
    describe_counter!(SOURCE_ERRORS_TOTAL, Unit::Count, "Source fetch/parse failures.");
    describe_counter!(NOTIFICATIONS_TOTAL, Unit::Count, "Notifications delivered.");
    describe_counter!(NOTIFY_ERRORS_TOTAL, Unit::Count, "Notification delivery failures.");
}
