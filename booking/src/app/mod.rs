//! Application services: the imperative shell around the core domain.
//!
//! Services own the request-level workflow:
//! 1. Check the caller's session
//! 2. Load what the command needs through the repository traits
//! 3. Run the pure validation / reducer logic
//! 4. Map the outcome to a [`ServiceError`] handlers can render

mod orders;
mod profiles;
mod reviews;

pub use orders::{AdminCommand, BookingService};
pub use profiles::ProfileService;
pub use reviews::{ReviewService, ServiceRatings};

use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use temple_booking_core::environment::{Clock, StoreError};
use temple_booking_core::form::SchemaError;
use temple_booking_core::order::OrderError;
use axum::http::StatusCode;
use temple_booking_web::AppError;
use thiserror::Error;

/// Errors returned by application services.
///
/// Display strings are the user-facing message.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No valid session; carries the localized prompt to sign in.
    #[error("{0}")]
    LoginRequired(&'static str),

    /// The addressed resource does not exist (or is not the caller's).
    #[error("{0}")]
    NotFound(&'static str),

    /// Input failed validation.
    #[error("{message}")]
    Invalid {
        /// Summary message.
        message: String,
        /// Messages keyed by field.
        errors: BTreeMap<String, String>,
    },

    /// A stored form schema could not be decoded.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The order lifecycle refused the command.
    #[error(transparent)]
    Rejected(OrderError),

    /// A write failed; `message` is shown, `detail` only logged.
    #[error("{message}")]
    SaveFailed {
        /// Localized message.
        message: &'static str,
        /// Underlying failure.
        detail: String,
    },

    /// A write did not settle in time and may still have committed.
    #[error("{message}")]
    Unconfirmed {
        /// Localized message.
        message: &'static str,
        /// Underlying failure.
        detail: String,
    },

    /// Repository failure on a read path.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::LoginRequired(message) => Self::unauthorized(message),
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Invalid { message, errors } => Self::validation(message).with_field_errors(errors),
            ServiceError::Schema(schema) => Self::validation(schema.to_string()),
            ServiceError::Rejected(rejection) => Self::conflict(rejection.to_string()),
            ServiceError::SaveFailed { message, detail } => Self::internal(message).with_source(anyhow::anyhow!(detail)),
            ServiceError::Unconfirmed { message, detail } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, message, "WRITE_UNCONFIRMED").with_source(anyhow::anyhow!(detail))
            }
            ServiceError::Store(store) => Self::from(store),
        }
    }
}

/// Local calendar used to decide the earliest bookable date.
#[derive(Clone)]
pub struct BookingCalendar {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl BookingCalendar {
    /// Creates a new `BookingCalendar`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Today's date in the configured offset.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// The underlying clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use temple_booking_core::order::{OrderId, OrderStatus};
    use temple_booking_testing::mocks::FixedClock;

    fn calendar_at(rfc3339: &str, offset_hours: i32) -> BookingCalendar {
        let now = DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc);
        BookingCalendar::new(
            Arc::new(FixedClock::new(now)),
            FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        )
    }

    #[test]
    fn today_follows_local_offset() {
        // 18:30 UTC is already the next day in Bangkok
        let calendar = calendar_at("2025-03-01T18:30:00Z", 7);
        assert_eq!(calendar.today(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());

        let utc = calendar_at("2025-03-01T18:30:00Z", 0);
        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    }

    #[test]
    fn service_errors_map_to_status() {
        let login = AppError::from(ServiceError::LoginRequired("กรุณาเข้าสู่ระบบก่อนทำการจอง"));
        assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(login.message(), "กรุณาเข้าสู่ระบบก่อนทำการจอง");

        let rejected = AppError::from(ServiceError::Rejected(OrderError::InvalidTransition {
            id: OrderId::new(3),
            from: OrderStatus::Completed,
            to: OrderStatus::Cancelled,
        }));
        assert_eq!(rejected.status(), StatusCode::CONFLICT);

        let failed = AppError::from(ServiceError::SaveFailed {
            message: "ไม่สามารถบันทึกคำจองได้ กรุณาลองใหม่อีกครั้ง",
            detail: "connection reset".to_string(),
        });
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.message(), "ไม่สามารถบันทึกคำจองได้ กรุณาลองใหม่อีกครั้ง");

        let unconfirmed = AppError::from(ServiceError::Unconfirmed {
            message: temple_booking_core::messages::ORDER_WRITE_UNCONFIRMED,
            detail: "Timed out waiting for the action to settle".to_string(),
        });
        assert_eq!(unconfirmed.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(unconfirmed.code(), "WRITE_UNCONFIRMED");
    }

    #[test]
    fn invalid_carries_field_errors() {
        let mut errors = BTreeMap::new();
        errors.insert("date".to_string(), "กรุณาเลือกวันที่".to_string());

        let err = AppError::from(ServiceError::Invalid {
            message: "กรุณากรอกข้อมูลให้ครบถ้วน".to_string(),
            errors,
        });

        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.field_errors().unwrap()["date"], "กรุณาเลือกวันที่");
    }
}
