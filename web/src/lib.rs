//! Axum integration for the temple booking service.
//!
//! Handlers are thin: they extract the request, call an application service,
//! and map the result to a response. This crate holds the pieces every
//! handler shares:
//!
//! - [`AppError`]: the failure type handlers return, rendered as
//!   `{ "success": false, "code", "error", "errors"? }`
//! - [`CorrelationId`] and [`correlation_id_layer`]: per-request ids that tie
//!   log lines together and are echoed back to the client
//! - liveness and readiness handlers
//!
//! # Example
//!
//! ```ignore
//! use axum::{Json, Router, routing::get};
//! use temple_booking_web::{AppError, correlation_id_layer, handlers::health_check};
//!
//! async fn handler() -> Result<Json<Listing>, AppError> {
//!     Err(AppError::not_found("Temple not found"))
//! }
//!
//! let app = Router::new()
//!     .route("/health", get(health_check))
//!     .route("/api/listing", get(handler))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CorrelationId, JsonBody};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
