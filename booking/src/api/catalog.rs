//! Catalog endpoints.
//!
//! - GET /api/services/:service_type - temples offering a service
//! - GET /api/services/:service_type/temples/:slug - one temple's service page

use crate::app::ServiceRatings;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use temple_booking_core::catalog::{GeoPoint, Temple, TempleListing};
use temple_booking_core::form::{FormValues, RenderedForm};
use temple_booking_core::messages;
use temple_booking_core::order::ServiceId;
use temple_booking_web::{AppError, WebResult};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSort {
    /// Nearest first (all distances are 0 without a location).
    #[default]
    Distance,
    /// Highest rated first.
    Rating,
}

/// Query parameters for listing temples.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    /// Caller latitude.
    pub lat: Option<f64>,
    /// Caller longitude.
    pub lng: Option<f64>,
    /// Listing order.
    #[serde(default)]
    pub sort: ListingSort,
}

impl ListingQuery {
    fn origin(&self) -> WebResult<Option<GeoPoint>> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Ok(Some(GeoPoint::new(lat, lng))),
            (None, None) => Ok(None),
            _ => Err(AppError::bad_request("lat and lng must be given together")),
        }
    }
}

/// Temples offering one service type.
#[derive(Debug, Serialize)]
pub struct ServiceListingResponse {
    /// Requested service type.
    pub service_type: String,
    /// Thai name of the service.
    pub service_name: String,
    /// Matching temples.
    pub temples: Vec<TempleListing>,
}

/// A temple's service page.
#[derive(Debug, Serialize)]
pub struct TempleServiceResponse {
    /// The temple.
    pub temple: Temple,
    /// Service id, referenced by bookings.
    pub service_id: ServiceId,
    /// Service type.
    pub service_type: String,
    /// Thai name of the service.
    pub service_name: String,
    /// Rendered booking form with date floor and slot menu.
    pub form: RenderedForm,
    /// Service and temple ratings.
    pub rating: ServiceRatings,
}

// ============================================================================
// Handlers
// ============================================================================

/// List the temples offering `service_type`.
///
/// ```bash
/// curl "http://localhost:8080/api/services/car?lat=13.75&lng=100.49&sort=distance"
/// ```
///
/// # Errors
///
/// 400 when only one coordinate is given.
pub async fn list_temples(
    State(state): State<AppState>,
    Path(service_type): Path<String>,
    Query(query): Query<ListingQuery>,
) -> WebResult<Json<ServiceListingResponse>> {
    let origin = query.origin()?;

    let mut temples: Vec<TempleListing> = state
        .catalog
        .services_by_type(&service_type)
        .await?
        .into_iter()
        .map(|detail| TempleListing::new(detail, origin))
        .collect();

    match query.sort {
        ListingSort::Distance => temples.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km)),
        ListingSort::Rating => temples.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
    }

    Ok(Json(ServiceListingResponse {
        service_name: messages::service_listing_name(&service_type).to_string(),
        service_type,
        temples,
    }))
}

/// A temple's service page: temple details, rendered form and ratings.
///
/// ```bash
/// curl http://localhost:8080/api/services/car/temples/wat-arun
/// ```
///
/// # Errors
///
/// 404 when the temple does not offer the service; 422 when its stored form
/// cannot be decoded.
pub async fn temple_service(
    State(state): State<AppState>,
    Path((service_type, slug)): Path<(String, String)>,
) -> WebResult<Json<TempleServiceResponse>> {
    let detail = state
        .catalog
        .temple_service(&slug, &service_type)
        .await?
        .ok_or_else(|| AppError::not_found("Service not found"))?;

    let form = state.bookings.engine().render(
        &detail.service.form,
        &FormValues::new(),
        state.bookings.calendar().today(),
    );
    let rating = state.reviews.ratings(&slug, &service_type).await?;

    Ok(Json(TempleServiceResponse {
        temple: detail.temple,
        service_id: detail.service.id,
        service_name: messages::service_listing_name(&service_type).to_string(),
        service_type,
        form,
        rating,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn origin_requires_both_coordinates() {
        let both = ListingQuery {
            lat: Some(13.7),
            lng: Some(100.5),
            sort: ListingSort::Distance,
        };
        assert!(both.origin().unwrap().is_some());

        assert!(ListingQuery::default().origin().unwrap().is_none());

        let half = ListingQuery {
            lat: Some(13.7),
            ..ListingQuery::default()
        };
        assert_eq!(half.origin().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
