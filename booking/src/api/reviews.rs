//! Review endpoints.
//!
//! - GET /api/services/:service_type/temples/:slug/reviews - newest first
//! - POST /api/services/:service_type/temples/:slug/reviews - create or revise (requires auth)
//! - GET /api/services/:service_type/temples/:slug/reviews/mine - caller's review (requires auth)
//! - GET /api/services/:service_type/temples/:slug/rating - service and temple ratings

use crate::app::ServiceRatings;
use crate::auth::{MaybeSessionUser, SessionUser};
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use temple_booking_core::review::{RatingSummary, Review, ReviewInput, ReviewWithAuthor};
use temple_booking_web::{JsonBody, WebResult};

/// Response after writing a review.
#[derive(Debug, Serialize)]
pub struct ReviewWrittenResponse {
    /// Always `true`.
    pub success: bool,
    /// `true` for a first review, `false` for a revision.
    pub created: bool,
    /// The review as stored.
    pub review: Review,
    /// The temple's refreshed aggregate.
    pub temple_rating: RatingSummary,
}

/// Reviews of a temple service, newest first, with author name and avatar.
///
/// # Errors
///
/// 500 when the read fails.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path((service_type, slug)): Path<(String, String)>,
) -> WebResult<Json<Vec<ReviewWithAuthor>>> {
    Ok(Json(state.reviews.list(&slug, &service_type).await?))
}

/// Create or revise the caller's review.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/services/car/temples/wat-arun/reviews \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"rating": 5, "comment": "ดีมาก"}'
/// ```
///
/// Answers 201 for a new review and 200 for a revision.
///
/// # Errors
///
/// 401 without a session, 404 for an unknown temple or service, 422 for a bad rating
/// or comment, 500 when the write fails.
pub async fn submit_review(
    State(state): State<AppState>,
    session: MaybeSessionUser,
    Path((service_type, slug)): Path<(String, String)>,
    JsonBody(input): JsonBody<ReviewInput>,
) -> WebResult<(StatusCode, Json<ReviewWrittenResponse>)> {
    let outcome = state
        .reviews
        .submit(session.user(), &slug, &service_type, input)
        .await?;

    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(ReviewWrittenResponse {
            success: true,
            created: outcome.created,
            review: outcome.review,
            temple_rating: outcome.temple_rating,
        }),
    ))
}

/// The caller's review of this temple service; `null` when none.
///
/// # Errors
///
/// 401 without a session.
pub async fn my_review(
    State(state): State<AppState>,
    session: SessionUser,
    Path((service_type, slug)): Path<(String, String)>,
) -> WebResult<Json<Option<Review>>> {
    Ok(Json(state.reviews.mine(&session.user_id, &slug, &service_type).await?))
}

/// Live service rating and the temple's stored aggregate.
///
/// # Errors
///
/// 404 for an unknown temple.
pub async fn ratings(
    State(state): State<AppState>,
    Path((service_type, slug)): Path<(String, String)>,
) -> WebResult<Json<ServiceRatings>> {
    Ok(Json(state.reviews.ratings(&slug, &service_type).await?))
}
