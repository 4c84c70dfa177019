//! Router configuration for the booking service.

use super::health::readiness_check;
use super::state::AppState;
use crate::api::{bookings, catalog, reviews, user};
use axum::{
    Router,
    routing::{get, post},
};
use temple_booking_web::correlation_id_layer;
use temple_booking_web::handlers::health_check;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks are unauthenticated; everything else lives under `/api`.
/// Every request gets a correlation id and a trace span.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Catalog
        .route("/services/:service_type", get(catalog::list_temples))
        .route("/services/:service_type/temples/:slug", get(catalog::temple_service))
        // Bookings
        .route(
            "/services/:service_type/temples/:slug/bookings",
            post(bookings::create_booking),
        )
        // Reviews
        .route(
            "/services/:service_type/temples/:slug/reviews",
            get(reviews::list_reviews).post(reviews::submit_review),
        )
        .route("/services/:service_type/temples/:slug/reviews/mine", get(reviews::my_review))
        .route("/services/:service_type/temples/:slug/rating", get(reviews::ratings))
        // Signed-in user
        .route("/user/bookings", get(user::list_bookings))
        .route("/user/orders/:id", get(user::booking_detail))
        .route("/user/profile", get(user::profile).patch(user::update_profile))
        .route("/user/update", post(user::update_profile));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
