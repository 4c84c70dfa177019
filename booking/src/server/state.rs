//! Application state for the booking HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers:
//! - catalog reads and session lookup
//! - the booking, review and profile services

use crate::app::{BookingCalendar, BookingService, ProfileService, ReviewService};
use crate::config::BookingConfig;
use std::sync::Arc;
use temple_booking_core::catalog::{CatalogRepository, SessionRepository};
use temple_booking_core::environment::Clock;
use temple_booking_core::form::FormEngine;
use temple_booking_core::order::OrderRepository;
use temple_booking_core::review::ReviewRepository;
use temple_booking_core::user::UserRepository;

/// Application state shared across all HTTP handlers.
///
/// It's cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Temples and their services.
    pub catalog: Arc<dyn CatalogRepository>,
    /// Bearer token resolution.
    pub sessions: Arc<dyn SessionRepository>,
    /// Order workflows.
    pub bookings: Arc<BookingService>,
    /// Review workflows.
    pub reviews: Arc<ReviewService>,
    /// The caller's own profile.
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    /// Wire every service to one backing store.
    ///
    /// Production passes a `PostgresBookingStore`; tests an `InMemoryBookingStore`.
    #[must_use]
    pub fn new<S>(store: S, clock: Arc<dyn Clock>, booking: &BookingConfig) -> Self
    where
        S: OrderRepository + ReviewRepository + CatalogRepository + SessionRepository + UserRepository + 'static,
    {
        let store = Arc::new(store);
        let calendar = BookingCalendar::new(Arc::clone(&clock), booking.utc_offset);

        let profiles = ProfileService::new(store.clone(), calendar.clone());
        let bookings = BookingService::new(
            store.clone(),
            store.clone(),
            FormEngine::new(booking.slots),
            calendar,
        );
        let reviews = ReviewService::new(store.clone(), clock);

        Self {
            catalog: store.clone(),
            sessions: store,
            bookings: Arc::new(bookings),
            reviews: Arc::new(reviews),
            profiles: Arc::new(profiles),
        }
    }
}
