//! HTTP API handlers.
//!
//! Handlers extract the request, call an application service and map the
//! result; failures render through [`AppError`](temple_booking_web::AppError).

pub mod bookings;
pub mod catalog;
pub mod reviews;
pub mod user;
