//! Error type for web handlers.
//!
//! [`AppError`] bridges domain failures and HTTP responses. Every failure is
//! rendered with the same envelope the booking pages expect:
//!
//! ```json
//! { "success": false, "code": "VALIDATION_ERROR", "error": "...", "errors": { "plate": "..." } }
//! ```

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use temple_booking_core::environment::StoreError;
use temple_booking_core::messages;

/// Application error type for web handlers.
///
/// The message is user-facing (often localized); the optional source is only
/// logged.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Booking>, AppError> {
///     let booking = find(id).await?.ok_or_else(|| AppError::not_found("Order not found"))?;
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
    field_errors: Option<BTreeMap<String, String>>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            field_errors: None,
            source: None,
        }
    }

    /// Attach the underlying error; it is logged for server errors and never sent.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach per-field messages, keyed by form field.
    #[must_use]
    pub fn with_field_errors(mut self, errors: BTreeMap<String, String>) -> Self {
        self.field_errors = Some(errors);
        self
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// 401 Unauthorized.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// 409 Conflict.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "CONFLICT")
    }

    /// 422 Unprocessable Entity.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_SERVER_ERROR")
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// User-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Per-field messages, if any.
    #[must_use]
    pub const fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        self.field_errors.as_ref()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = ?source,
                    "Internal server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Internal server error"
                ),
            }
        }
        metrics::counter!("http_errors_total", "code" => self.code).increment(1);

        let body = ErrorResponse {
            success: false,
            code: self.code,
            error: self.message,
            errors: self.field_errors,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(messages::GENERIC_ERROR).with_source(err)
    }
}

/// Undecodable bodies keep axum's status (400, 415 or 422) but use the envelope.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), detail = %rejection.body_text(), "Rejected request body");
        match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => Self::validation(messages::INVALID_BODY),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::new(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                messages::INVALID_BODY,
                "UNSUPPORTED_MEDIA_TYPE",
            ),
            _ => Self::bad_request(messages::INVALID_BODY),
        }
    }
}

/// Generic mapping; application services usually pick a localized message first.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => Self::not_found(err.to_string()),
            StoreError::Schema(schema) => Self::validation(schema.to_string()),
            StoreError::Conflict(message) => Self::conflict(message.clone()),
            StoreError::Serialization(_) | StoreError::Database(_) => {
                Self::internal(messages::GENERIC_ERROR).with_source(err)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use temple_booking_core::form::SchemaError;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_validation_carries_field_errors() {
        let mut fields = BTreeMap::new();
        fields.insert("plate".to_string(), "กรุณากรอกทะเบียนรถ".to_string());
        let err = AppError::validation("กรุณากรอกข้อมูลให้ครบถ้วน").with_field_errors(fields);

        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.field_errors().unwrap().len(), 1);
    }

    #[test]
    fn test_store_errors_map_to_status() {
        let missing = AppError::from(StoreError::not_found("temple", "wat-x"));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let schema = AppError::from(StoreError::Schema(SchemaError::UnsupportedFieldType {
            key: "plate".to_string(),
            field_type: "radio".to_string(),
        }));
        assert_eq!(schema.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(schema.message(), "Unsupported field type: radio");

        let db = AppError::from(StoreError::Database("connection reset".to_string()));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(db.message(), messages::GENERIC_ERROR);
    }

    #[tokio::test]
    async fn test_response_envelope() {
        let response = AppError::unauthorized("Unauthorized").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "code": "UNAUTHORIZED", "error": "Unauthorized" })
        );
    }
}
