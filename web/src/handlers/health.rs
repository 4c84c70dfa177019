//! Health check endpoints.
//!
//! Used by load balancers and monitoring to verify the service is up
//! (`/health`) and able to reach its database (`/ready`).

use axum::{Json, http::StatusCode};
use serde::Serialize;
use temple_booking_core::environment::StoreError;

const DATABASE_UNAVAILABLE: &str = "database unavailable";

/// Body of both health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `ok` or `unavailable`.
    pub status: &'static str,
    /// Which dependency failed; details stay in the logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness: 200 whenever the process can answer. Does not touch dependencies.
///
/// ```text
/// GET /health  ->  { "status": "ok" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthReport>) {
    (
        StatusCode::OK,
        Json(HealthReport {
            status: "ok",
            error: None,
        }),
    )
}

/// Readiness response for the outcome of a dependency probe.
///
/// 200 when the probe succeeded, 503 otherwise. The probe error is logged,
/// never returned, since `/ready` is unauthenticated.
#[must_use]
pub fn readiness(probe: Result<(), StoreError>) -> (StatusCode, Json<HealthReport>) {
    match probe {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthReport {
                status: "ok",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport {
                    status: "unavailable",
                    error: Some(DATABASE_UNAVAILABLE.to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, Json(body)) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[test]
    fn test_readiness_reports_failure() {
        let (status, Json(body)) = readiness(Err(StoreError::Database(
            "connection to 10.0.0.5:5432 refused for user booking".to_string(),
        )));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "unavailable");
        assert_eq!(body.error.as_deref(), Some("database unavailable"));
    }
}
