//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! - `request` - Request count and latency by path pattern, method, status
//! - `follow_repair` - Outcome of each background reconcile pass

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use regex_lite::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

use crate::graph::ReconcileReport;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing events; aggregate them from the logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "authorship_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

fn uuid_regex() -> Option<&'static Regex> {
    static UUID: OnceLock<Option<Regex>> = OnceLock::new();
    UUID.get_or_init(|| {
        Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").ok()
    })
    .as_ref()
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces user and post ids with a placeholder.
pub fn normalize_path(path: &str) -> String {
    match uuid_regex() {
        Some(re) => re.replace_all(path, ":id").to_string(),
        None => path.to_string(),
    }
}

/// Record the outcome of a follow-edge reconcile pass.
pub fn record_reconcile(report: &ReconcileReport, latency_ms: u64) {
    info!(
        target: "authorship_kernel::metrics",
        metric_type = "follow_repair",
        attempted = report.attempted,
        repaired = report.repaired,
        remaining = report.remaining,
        latency_ms = latency_ms,
        "follow_repair_metric"
    );
}
