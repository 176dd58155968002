use std::net::SocketAddr;

// ── Availability engine ─────────────────────────────────────────

/// Counter: occupancy index rebuilds.
pub const REBUILDS_TOTAL: &str = "tablebook_rebuilds_total";

/// Histogram: rebuild duration in seconds.
pub const REBUILD_DURATION_SECONDS: &str = "tablebook_rebuild_duration_seconds";

/// Counter: raw records left out of a rebuild. Labels: list.
pub const RECORDS_SKIPPED_TOTAL: &str = "tablebook_records_skipped_total";

/// Counter: refreshes discarded because a newer one was already applied.
pub const REFRESH_STALE_TOTAL: &str = "tablebook_refresh_stale_total";

/// Counter: refreshes whose fetch failed.
pub const REFRESH_FAILED_TOTAL: &str = "tablebook_refresh_failed_total";

// ── Session activity ────────────────────────────────────────────

/// Counter: table clicks rejected. Labels: reason.
pub const SELECTION_REJECTED_TOTAL: &str = "tablebook_selection_rejected_total";

/// Counter: bookings posted.
pub const BOOKINGS_SUBMITTED_TOTAL: &str = "tablebook_bookings_submitted_total";

/// Counter: cart orders posted.
pub const ORDERS_SUBMITTED_TOTAL: &str = "tablebook_orders_submitted_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
