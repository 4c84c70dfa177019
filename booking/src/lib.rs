//! # Temple Booking
//!
//! The temple-service booking application: users browse temples offering a
//! ritual service, book it through the temple's dynamic form, follow their
//! bookings and leave one review per temple service.
//!
//! ## Layout
//!
//! - [`config`]: environment-driven configuration
//! - [`app`]: application services ([`BookingService`], [`ReviewService`], [`ProfileService`])
//! - [`auth`]: bearer-token session extractors
//! - [`api`]: HTTP handlers
//! - [`server`]: state, router and health endpoints
//!
//! ## Example
//!
//! ```ignore
//! let store = PostgresBookingStore::connect(&config.database.pool_config()).await?;
//! store.migrate().await?;
//! let state = AppState::new(store, Arc::new(SystemClock), &config.booking);
//! axum::serve(listener, build_router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod server;

pub use app::{AdminCommand, BookingCalendar, BookingService, ProfileService, ReviewService, ServiceError};
pub use config::{Config, ConfigError};
pub use server::{AppState, build_router};
