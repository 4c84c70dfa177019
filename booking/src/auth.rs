//! Session extractors.
//!
//! Sessions are issued elsewhere; this service only resolves
//! `Authorization: Bearer <token>` against the `sessions` table through
//! [`SessionRepository`].
//!
//! ```rust,ignore
//! // Require a session
//! async fn my_bookings(session: SessionUser) -> Result<Json<Vec<BookingView>>, AppError> { .. }
//!
//! // Session checked by the service, which answers with a localized prompt
//! async fn create_booking(session: MaybeSessionUser) -> Result<..., AppError> { .. }
//! ```

use crate::server::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use temple_booking_core::order::UserId;
use temple_booking_web::AppError;

const UNAUTHORIZED: &str = "Unauthorized";

/// Bearer token extracted from `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    fn from_parts(parts: &Parts) -> Option<Self> {
        let header = parts.headers.get("authorization")?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?.trim();
        if token.is_empty() {
            return None;
        }
        Some(Self(token.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts).ok_or_else(|| AppError::unauthorized(UNAUTHORIZED))
    }
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Owner of the session.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeSessionUser(user) = MaybeSessionUser::from_request_parts(parts, state).await?;
        user.map(|user_id| Self { user_id })
            .ok_or_else(|| AppError::unauthorized(UNAUTHORIZED))
    }
}

/// The session user when a valid token is present, otherwise `None`.
///
/// Missing, malformed, unknown and expired tokens all resolve to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeSessionUser(pub Option<UserId>);

impl MaybeSessionUser {
    /// The user, if signed in.
    #[must_use]
    pub const fn user(&self) -> Option<&UserId> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeSessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(BearerToken(token)) = BearerToken::from_parts(parts) else {
            return Ok(Self(None));
        };

        let user = state.sessions.resolve_token(&token).await?;
        if user.is_none() {
            tracing::debug!("Bearer token did not resolve to a live session");
        }
        Ok(Self(user))
    }
}
