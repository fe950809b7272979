//! Business metrics for the drop engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `drop_engine_purchases_total{outcome}` - Purchase attempts by outcome
//!   (`completed`, `drop_not_active`, `insufficient_stock`, `validation`, `not_found`, `error`)
//! - `drop_engine_units_sold_total` - Units sold across all drops
//! - `drop_engine_revenue_cents_total` - Buyer-facing revenue in cents
//! - `drop_engine_drops_sold_out_total` - Drops that sold their last unit
//! - `drop_engine_drops_created_total` - Drops created
//! - `drop_engine_cancellations_total{outcome}` - Cancellation attempts by outcome
//! - `drop_engine_follows_total{action,outcome}` - Follow/unfollow requests
//! - `drop_engine_store_retries_total{operation}` - Store write conflicts retried
//!
//! ## Histograms
//! - `drop_engine_purchase_duration_seconds` - End-to-end purchase latency

use drop_engine_core::error::{DropError, ErrorKind};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder with an HTTP scrape listener on `addr` and registers
/// metric descriptions.
///
/// Must be called from inside a Tokio runtime, once per process.
///
/// # Errors
///
/// Returns [`MetricsError`] if the exporter cannot be built or a recorder is already
/// installed.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_business_metrics();
    tracing::info!(%addr, "Metrics exporter listening at http://{addr}/metrics");
    Ok(())
}

/// Registers all business metric descriptions.
pub fn register_business_metrics() {
    describe_counter!(
        "drop_engine_purchases_total",
        "Purchase attempts by outcome"
    );
    describe_counter!(
        "drop_engine_units_sold_total",
        "Total number of units sold across all drops"
    );
    describe_counter!(
        "drop_engine_revenue_cents_total",
        "Buyer-facing revenue from completed purchases in cents"
    );
    describe_counter!(
        "drop_engine_drops_sold_out_total",
        "Number of drops that sold their last unit"
    );
    describe_counter!("drop_engine_drops_created_total", "Number of drops created");
    describe_counter!(
        "drop_engine_cancellations_total",
        "Cancellation attempts by outcome"
    );
    describe_counter!(
        "drop_engine_follows_total",
        "Follow and unfollow requests by outcome"
    );
    describe_counter!(
        "drop_engine_store_retries_total",
        "Store write conflicts that were retried"
    );
    describe_histogram!(
        "drop_engine_purchase_duration_seconds",
        "Time taken to run a purchase, including retries"
    );

    tracing::info!("Business metrics registered");
}

/// Label for a failed operation.
#[must_use]
pub const fn outcome_label(err: &DropError) -> &'static str {
    match err.kind() {
        ErrorKind::NotFound => "not_found",
        ErrorKind::Forbidden => "forbidden",
        ErrorKind::DropNotActive => "drop_not_active",
        ErrorKind::InsufficientStock => "insufficient_stock",
        ErrorKind::AlreadyFinal => "already_final",
        ErrorKind::Validation => "validation",
        ErrorKind::Internal => "error",
    }
}

/// Record a completed purchase.
pub fn record_purchase_completed(quantity: u32, revenue_cents: u64, sold_out: bool, duration_secs: f64) {
    metrics::counter!("drop_engine_purchases_total", "outcome" => "completed").increment(1);
    metrics::counter!("drop_engine_units_sold_total").increment(u64::from(quantity));
    metrics::counter!("drop_engine_revenue_cents_total").increment(revenue_cents);
    if sold_out {
        metrics::counter!("drop_engine_drops_sold_out_total").increment(1);
    }
    metrics::histogram!("drop_engine_purchase_duration_seconds").record(duration_secs);
}

/// Record a rejected or failed purchase.
pub fn record_purchase_rejected(err: &DropError, duration_secs: f64) {
    metrics::counter!("drop_engine_purchases_total", "outcome" => outcome_label(err)).increment(1);
    metrics::histogram!("drop_engine_purchase_duration_seconds").record(duration_secs);
}

/// Record a created drop.
pub fn record_drop_created() {
    metrics::counter!("drop_engine_drops_created_total").increment(1);
}

/// Record a cancellation attempt.
pub fn record_cancellation(result: Result<(), &DropError>) {
    let outcome = result.map_or_else(outcome_label, |()| "cancelled");
    metrics::counter!("drop_engine_cancellations_total", "outcome" => outcome).increment(1);
}

/// Record a follow or unfollow.
pub fn record_follow(action: &'static str, outcome: &'static str) {
    metrics::counter!("drop_engine_follows_total", "action" => action, "outcome" => outcome)
        .increment(1);
}

/// Record a retried store write conflict.
pub fn record_store_retry(operation: &'static str) {
    metrics::counter!("drop_engine_store_retries_total", "operation" => operation).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use drop_engine_core::error::StoreError;

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome_label(&DropError::SelfFollow), "forbidden");
        assert_eq!(
            outcome_label(&DropError::from(StoreError::Database("down".into()))),
            "error"
        );
        assert_eq!(outcome_label(&DropError::validation("bad")), "validation");
    }

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        register_business_metrics();
        record_purchase_completed(2, 4_298, true, 0.01);
        record_purchase_rejected(&DropError::validation("quantity"), 0.001);
        record_cancellation(Ok(()));
        record_follow("follow", "created");
        record_store_retry("purchase");
    }
}
