//! Request-scoped values handlers can ask for.

use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
};
use serde::de::DeserializeOwned;
use std::fmt;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;

/// The id logged with every line a request produces.
///
/// Prefers the value [`correlation_id_layer`] stored on the request, so the
/// handler, the span and the response header all agree. Without the layer it
/// falls back to the header, then to a fresh UUID. Never rejects.
///
/// [`correlation_id_layer`]: crate::middleware::correlation_id_layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Parse `X-Correlation-ID`, or mint a new id when absent or not a UUID.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .unwrap_or_else(|| Self::from_headers(&parts.headers)))
    }
}

/// [`Json`] whose rejection is an [`AppError`], so a malformed body gets the
/// same `{ success, code, error }` envelope as every other failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .unwrap();

        let (mut parts, ()) = req.into_parts();
        let Ok(correlation_id) = CorrelationId::from_request_parts(&mut parts, &()).await;

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_extension_wins_over_header() {
        let stored = CorrelationId(Uuid::new_v4());
        let mut req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap();
        req.extensions_mut().insert(stored);

        let (mut parts, ()) = req.into_parts();
        let Ok(correlation_id) = CorrelationId::from_request_parts(&mut parts, &()).await;

        assert_eq!(correlation_id, stored);
    }

    #[test]
    fn test_invalid_header_generates_new() {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_ID_HEADER, "not-a-uuid".parse().unwrap());

        let id = CorrelationId::from_headers(&headers);
        assert_ne!(id.0, Uuid::nil());
    }

    #[derive(Debug, serde::Deserialize)]
    struct Rating {
        stars: u8,
    }

    async fn extract(body: &str, content_type: &str) -> Result<JsonBody<Rating>, AppError> {
        let req = Request::builder()
            .method("POST")
            .header("content-type", content_type)
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        JsonBody::<Rating>::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_json_body_decodes() {
        let JsonBody(rating) = extract(r#"{"stars": 4}"#, "application/json").await.unwrap();
        assert_eq!(rating.stars, 4);
    }

    #[tokio::test]
    async fn test_json_body_rejections_use_app_error() {
        let wrong_shape = extract(r#"{"stars": "many"}"#, "application/json").await.unwrap_err();
        assert_eq!(wrong_shape.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(wrong_shape.code(), "VALIDATION_ERROR");
        assert_eq!(wrong_shape.message(), temple_booking_core::messages::INVALID_BODY);

        let broken = extract("{", "application/json").await.unwrap_err();
        assert_eq!(broken.status(), axum::http::StatusCode::BAD_REQUEST);

        let not_json = extract("stars=4", "text/plain").await.unwrap_err();
        assert_eq!(not_json.status(), axum::http::StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
