//! Temples, the services they offer, and the read-side views joining them.

use crate::environment::StoreFuture;
use crate::form::FormSchema;
use crate::messages;
use crate::order::{ServiceId, UserId};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle (haversine) distance in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.latitude.to_radians().cos() * other.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// A temple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Temple {
    /// Primary key.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Image URLs; the first is used as the listing thumbnail.
    pub thumbnails: Vec<String>,
    /// Free-form description.
    pub information: String,
    /// Postal address.
    pub address: String,
    /// Coordinates.
    pub location: GeoPoint,
    /// Contact phone.
    pub phone: Option<String>,
    /// Stored average over all reviews.
    pub rating: f64,
    /// Stored number of reviews.
    pub review_count: i64,
    /// Opening time, `HH:MM`.
    pub open_time: String,
    /// Closing time, `HH:MM`.
    pub close_time: String,
}

impl Temple {
    /// `"HH:MM - HH:MM"`.
    #[must_use]
    pub fn opening_hours(&self) -> String {
        format!("{} - {}", self.open_time, self.close_time)
    }

    /// First thumbnail, if any.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnails.first().map(String::as_str)
    }

    /// Contact subset used in booking views.
    #[must_use]
    pub fn summary(&self) -> TempleSummary {
        TempleSummary {
            slug: self.slug.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            thumbnail: self.thumbnail().map(str::to_string),
        }
    }
}

/// Temple fields shown alongside a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempleSummary {
    /// Primary key.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Postal address.
    pub address: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// First thumbnail.
    pub thumbnail: Option<String>,
}

/// A bookable service of one temple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Primary key.
    pub id: ServiceId,
    /// Owning temple.
    pub temple_slug: String,
    /// Service type (e.g. `car`).
    pub service_type: String,
    /// Booking form.
    pub form: FormSchema,
}

/// A service joined with its temple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempleServiceDetail {
    /// The temple.
    pub temple: Temple,
    /// The service.
    pub service: Service,
}

/// One row of the "temples offering this service" listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempleListing {
    /// Temple slug.
    pub slug: String,
    /// Temple name.
    pub name: String,
    /// Temple address.
    pub address: String,
    /// Distance from the caller in km; `0` when no location was given.
    pub distance_km: f64,
    /// Stored temple rating.
    pub rating: f64,
    /// Stored review count.
    pub review_count: i64,
    /// Contact phone.
    pub phone: Option<String>,
    /// `"HH:MM - HH:MM"`.
    pub opening_hours: String,
    /// Localized service names offered in this row.
    pub services: Vec<String>,
    /// First thumbnail.
    pub image: Option<String>,
    /// Temple coordinates.
    pub location: GeoPoint,
    /// Service id to book.
    pub service_id: ServiceId,
    /// The service's booking form.
    pub form: FormSchema,
}

impl TempleListing {
    /// Build a listing row, measuring distance from `origin` when given.
    #[must_use]
    pub fn new(detail: TempleServiceDetail, origin: Option<GeoPoint>) -> Self {
        let TempleServiceDetail { temple, service } = detail;
        let distance_km = origin.map_or(0.0, |o| o.distance_km(&temple.location));
        let opening_hours = temple.opening_hours();
        let image = temple.thumbnail().map(str::to_string);

        Self {
            slug: temple.slug,
            name: temple.name,
            address: temple.address,
            distance_km,
            rating: temple.rating,
            review_count: temple.review_count,
            phone: temple.phone,
            opening_hours,
            services: vec![messages::service_listing_name(&service.service_type).to_string()],
            image,
            location: temple.location,
            service_id: service.id,
            form: service.form,
        }
    }
}

/// Catalog reads.
pub trait CatalogRepository: Send + Sync {
    /// Every temple offering `service_type`, joined with the service.
    fn services_by_type<'a>(&'a self, service_type: &'a str) -> StoreFuture<'a, Vec<TempleServiceDetail>>;

    /// One temple's service of `service_type`, if offered.
    fn temple_service<'a>(
        &'a self,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<TempleServiceDetail>>;

    /// Cheap connectivity check for readiness probes.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// Session lookup; sessions themselves are issued elsewhere.
pub trait SessionRepository: Send + Sync {
    /// User owning a live (unexpired) session token.
    fn resolve_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>>;
}
