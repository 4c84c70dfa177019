//! Business metrics for the booking service.
//!
//! # Exported Metrics
//!
//! - `bookings_orders_placed_total` - orders stored
//! - `bookings_orders_rejected_total{reason}` - submissions refused (`validation`, `persistence`)
//! - `bookings_reviews_written_total{outcome}` - review writes (`created`, `updated`, `invalid`, `failed`)
//! - `http_errors_total{code}` - error responses by code

use metrics::describe_counter;

/// Register metric descriptions. Call once at startup, after installing the recorder.
pub fn register_business_metrics() {
    describe_counter!("bookings_orders_placed_total", "Total number of orders stored");
    describe_counter!(
        "bookings_orders_rejected_total",
        "Total number of booking submissions refused, by reason (validation, persistence)"
    );
    describe_counter!(
        "bookings_reviews_written_total",
        "Total number of review writes, by outcome (created, updated, invalid, failed)"
    );
    describe_counter!("http_errors_total", "Total number of error responses, by error code");

    tracing::info!("Business metrics registered");
}
