//! Booking submission.
//!
//! - POST /api/services/:service_type/temples/:slug/bookings

use crate::auth::MaybeSessionUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use temple_booking_core::form::BookingSubmission;
use temple_booking_core::order::OrderId;
use temple_booking_web::{CorrelationId, JsonBody, WebResult};

/// Response after placing an order.
#[derive(Debug, Serialize)]
pub struct BookingCreatedResponse {
    /// Always `true`.
    pub success: bool,
    /// New order id.
    pub order_id: OrderId,
}

/// Submit a booking form.
///
/// The body carries the form values plus the appointment date and time:
///
/// ```bash
/// curl -X POST http://localhost:8080/api/services/car/temples/wat-arun/bookings \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{"values": {"plate": "กข 1234"}, "date": "2025-01-02", "time": "09:00"}'
/// ```
///
/// # Errors
///
/// 401 without a session, 404 for an unknown service, 422 with per-field
/// messages for an invalid form (or without them for an undecodable body), 500 when the order cannot be stored.
pub async fn create_booking(
    State(state): State<AppState>,
    session: MaybeSessionUser,
    correlation_id: CorrelationId,
    Path((service_type, slug)): Path<(String, String)>,
    JsonBody(submission): JsonBody<BookingSubmission>,
) -> WebResult<(StatusCode, Json<BookingCreatedResponse>)> {
    tracing::debug!(%correlation_id, temple = %slug, %service_type, "Booking submitted");

    let order_id = state
        .bookings
        .submit(session.user(), &slug, &service_type, &submission)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingCreatedResponse {
            success: true,
            order_id,
        }),
    ))
}
