//! Readiness probe backed by the catalog database.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use temple_booking_web::handlers::{HealthReport, readiness};

/// Readiness check endpoint.
///
/// Returns 200 when the database answers, 503 otherwise.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"ok"}
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    readiness(state.catalog.ping().await)
}
