//! Booking submission, admin transitions and booking reads.

use super::{BookingCalendar, ServiceError};
use std::sync::Arc;
use std::time::Duration;
use temple_booking_core::catalog::{CatalogRepository, TempleServiceDetail};
use temple_booking_core::form::{BookingSubmission, FormEngine};
use temple_booking_core::messages;
use temple_booking_core::order::{
    BookingDetail, BookingSummary, NewOrder, Order, OrderAction, OrderEnvironment, OrderError, OrderId,
    OrderReducer, OrderRepository, OrderState, UserId,
};
use temple_booking_runtime::{RuntimeError, Store};
use tracing::{error, info, warn};

const SERVICE_NOT_FOUND: &str = "Service not found";
const ORDER_NOT_FOUND: &str = "Order not found";

/// Default for how long a request waits for the order write to settle.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Staff-side lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// `pending → confirmed`
    Confirm,
    /// `confirmed → completed`
    Complete,
    /// `pending|confirmed → cancelled`
    Cancel,
}

impl AdminCommand {
    const fn action(self) -> OrderAction {
        match self {
            Self::Confirm => OrderAction::ConfirmOrder,
            Self::Complete => OrderAction::CompleteOrder,
            Self::Cancel => OrderAction::CancelOrder,
        }
    }
}

/// Order workflows.
///
/// Every command runs through its own [`Store`] over the [`OrderReducer`];
/// the reducer decides, the store executes the persistence effect.
pub struct BookingService {
    env: OrderEnvironment,
    catalog: Arc<dyn CatalogRepository>,
    engine: FormEngine,
    calendar: BookingCalendar,
    write_timeout: Duration,
}

impl BookingService {
    /// Creates a new `BookingService`
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        engine: FormEngine,
        calendar: BookingCalendar,
    ) -> Self {
        Self {
            env: OrderEnvironment::new(calendar.clock(), orders),
            catalog,
            engine,
            calendar,
            write_timeout: WRITE_TIMEOUT,
        }
    }

    /// Wait at most `timeout` for an order insert before answering.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// The form engine used for rendering and validation.
    #[must_use]
    pub const fn engine(&self) -> &FormEngine {
        &self.engine
    }

    /// The calendar deciding the earliest bookable date.
    #[must_use]
    pub const fn calendar(&self) -> &BookingCalendar {
        &self.calendar
    }

    /// Validate a booking form and store it as a `pending` order.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::LoginRequired`] without a session
    /// - [`ServiceError::NotFound`] when the temple does not offer the service
    /// - [`ServiceError::Invalid`] with per-field messages
    /// - [`ServiceError::SaveFailed`] when the insert fails
    /// - [`ServiceError::Unconfirmed`] when the insert outlives the write
    ///   timeout; it is abandoned, but may already have committed, so the
    ///   caller is told to check their bookings instead of retrying blindly
    pub async fn submit(
        &self,
        user: Option<&UserId>,
        temple_slug: &str,
        service_type: &str,
        submission: &BookingSubmission,
    ) -> Result<OrderId, ServiceError> {
        let Some(user) = user else {
            return Err(ServiceError::LoginRequired(messages::LOGIN_REQUIRED));
        };

        let TempleServiceDetail { service, .. } = self
            .catalog
            .temple_service(temple_slug, service_type)
            .await?
            .ok_or(ServiceError::NotFound(SERVICE_NOT_FOUND))?;

        let prepared = match self.engine.prepare(&service.form, submission, self.calendar.today()) {
            Ok(prepared) => prepared,
            Err(report) => {
                warn!(
                    user_id = %user,
                    temple = temple_slug,
                    service_type,
                    fields = ?report.errors().keys().collect::<Vec<_>>(),
                    "Booking form rejected"
                );
                metrics::counter!("bookings_orders_rejected_total", "reason" => "validation").increment(1);
                return Err(ServiceError::Invalid {
                    message: messages::FORM_INCOMPLETE.to_string(),
                    errors: report.into_errors(),
                });
            }
        };

        let order = NewOrder {
            user_id: user.clone(),
            service_id: service.id,
            responses: prepared.responses,
            form_snapshot: service.form,
            date: prepared.appointment,
        };

        let store = Store::new(OrderState::new(), OrderReducer::new(), self.env.clone());
        let outcome = store
            .send_and_wait_for(OrderAction::PlaceOrder { order }, OrderAction::is_event, self.write_timeout)
            .await;

        match outcome {
            Ok(OrderAction::OrderPlaced { order }) => {
                info!(
                    order_id = %order.id,
                    user_id = %user,
                    temple = temple_slug,
                    service_type,
                    date = %order.date,
                    "Order placed"
                );
                metrics::counter!("bookings_orders_placed_total").increment(1);
                Ok(order.id)
            }
            Ok(other) => Err(Self::save_failed(user, temple_slug, service_type, format!("{other:?}"))),
            Err(RuntimeError::Timeout) => {
                warn!(
                    user_id = %user,
                    temple = temple_slug,
                    service_type,
                    timeout_ms = u64::try_from(self.write_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Order write did not settle in time; outcome unknown"
                );
                metrics::counter!("bookings_orders_rejected_total", "reason" => "timeout").increment(1);
                Err(ServiceError::Unconfirmed {
                    message: messages::ORDER_WRITE_UNCONFIRMED,
                    detail: RuntimeError::Timeout.to_string(),
                })
            }
            Err(wait) => Err(Self::save_failed(user, temple_slug, service_type, wait.to_string())),
        }
    }

    fn save_failed(user: &UserId, temple_slug: &str, service_type: &str, detail: String) -> ServiceError {
        error!(
            user_id = %user,
            temple = temple_slug,
            service_type,
            error = %detail,
            "Failed to save order"
        );
        metrics::counter!("bookings_orders_rejected_total", "reason" => "persistence").increment(1);
        ServiceError::SaveFailed {
            message: messages::ORDER_SAVE_FAILED,
            detail,
        }
    }

    /// Apply a staff transition to an existing order.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] for an unknown order
    /// - [`ServiceError::Rejected`] when the lifecycle forbids the move
    /// - [`ServiceError::Store`] when the write fails or loses a race
    pub async fn transition(&self, id: OrderId, command: AdminCommand) -> Result<Order, ServiceError> {
        let order = self
            .env
            .orders
            .load(id)
            .await?
            .ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))?;

        let store = Store::new(OrderState::with_order(order), OrderReducer::new(), self.env.clone());
        store.send(command.action()).await;
        let (order, last_error) = store.state(|s| (s.order.clone(), s.last_error.clone())).await;

        match last_error {
            None => {
                info!(order_id = %id, command = ?command, "Order transitioned");
                order.ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))
            }
            Some(OrderError::Persistence(store_error)) => {
                error!(order_id = %id, command = ?command, error = %store_error, "Order transition failed");
                Err(ServiceError::Store(store_error))
            }
            Some(rejection) => {
                warn!(order_id = %id, command = ?command, reason = %rejection, "Order transition rejected");
                Err(ServiceError::Rejected(rejection))
            }
        }
    }

    /// The user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the read fails.
    pub async fn list_bookings(&self, user: &UserId) -> Result<Vec<BookingSummary>, ServiceError> {
        Ok(self.env.orders.list_for_user(user).await?)
    }

    /// One of the user's bookings with its form and temple.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the order is absent or belongs to someone else.
    pub async fn booking_detail(&self, user: &UserId, id: OrderId) -> Result<BookingDetail, ServiceError> {
        self.env
            .orders
            .find_for_user(user, id)
            .await?
            .ok_or(ServiceError::NotFound(ORDER_NOT_FOUND))
    }
}
