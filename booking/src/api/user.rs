//! The signed-in user's bookings and profile.
//!
//! - GET /api/user/bookings - newest first (requires auth)
//! - GET /api/user/orders/:id - one booking with its form and temple (requires auth)
//! - GET /api/user/profile - the caller's profile (requires auth)
//! - PATCH /api/user/profile, POST /api/user/update - edit name and contact details (requires auth)

use crate::auth::SessionUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use temple_booking_core::messages;
use temple_booking_core::order::{BookingDetail, BookingSummary, OrderId, OrderStatus};
use temple_booking_core::user::{ProfileInput, UserProfile};
use temple_booking_web::{JsonBody, WebResult};

/// One row of the bookings page.
#[derive(Debug, Serialize)]
pub struct BookingView {
    /// Order id.
    pub id: OrderId,
    /// Current status.
    pub status: OrderStatus,
    /// Temple slug.
    pub temple_slug: String,
    /// Temple name.
    pub temple_name: String,
    /// Service type.
    pub service_type: String,
    /// Thai name of the service.
    pub service_name: String,
    /// Appointment date, `YYYY-MM-DD`.
    pub date: String,
    /// Appointment time, `HH:MM`.
    pub time: String,
    /// When the booking was made.
    pub created_at: DateTime<Utc>,
}

impl From<BookingSummary> for BookingView {
    fn from(summary: BookingSummary) -> Self {
        Self {
            id: summary.id,
            status: summary.status,
            service_name: messages::service_display_name(&summary.service_type).to_string(),
            date: summary.date.format("%Y-%m-%d").to_string(),
            time: summary.date.format("%H:%M").to_string(),
            temple_slug: summary.temple_slug,
            temple_name: summary.temple_name,
            service_type: summary.service_type,
            created_at: summary.created_at,
        }
    }
}

/// A booking with the Thai service name alongside.
#[derive(Debug, Serialize)]
pub struct BookingDetailView {
    /// Order, service form and temple.
    #[serde(flatten)]
    pub detail: BookingDetail,
    /// Thai name of the service.
    pub service_name: String,
}

/// The caller's bookings, newest first.
///
/// # Errors
///
/// 401 without a session.
pub async fn list_bookings(State(state): State<AppState>, session: SessionUser) -> WebResult<Json<Vec<BookingView>>> {
    let bookings = state.bookings.list_bookings(&session.user_id).await?;
    Ok(Json(bookings.into_iter().map(BookingView::from).collect()))
}

/// One of the caller's bookings.
///
/// # Errors
///
/// 401 without a session; 404 `Order not found` when the order is absent or
/// belongs to another user.
pub async fn booking_detail(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<i64>,
) -> WebResult<Json<BookingDetailView>> {
    let detail = state
        .bookings
        .booking_detail(&session.user_id, OrderId::new(id))
        .await?;

    Ok(Json(BookingDetailView {
        service_name: messages::service_display_name(&detail.service_type).to_string(),
        detail,
    }))
}

/// The caller's profile.
///
/// # Errors
///
/// 401 without a session; 404 `User not found` when the session outlived its user.
pub async fn profile(State(state): State<AppState>, session: SessionUser) -> WebResult<Json<UserProfile>> {
    Ok(Json(state.profiles.profile(&session.user_id).await?))
}

/// Replace the caller's name, phone, address and birth date.
///
/// Blank optional fields clear the stored value.
///
/// # Errors
///
/// 401 without a session, 422 with per-field messages for invalid input,
/// 500 with a localized message when the write fails.
pub async fn update_profile(
    State(state): State<AppState>,
    session: SessionUser,
    JsonBody(input): JsonBody<ProfileInput>,
) -> WebResult<Json<UserProfile>> {
    Ok(Json(state.profiles.update(&session.user_id, input).await?))
}
