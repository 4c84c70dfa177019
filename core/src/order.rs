//! Orders: booking records and their status lifecycle.
//!
//! An order is created `pending` from a validated booking form and afterwards
//! moves through `pending → confirmed → completed`, or is cancelled from
//! `pending` or `confirmed`. Every transition stamps its own timestamp; an order
//! is never both completed and cancelled.
//!
//! [`OrderReducer`] owns those rules. Commands are validated against the loaded
//! order, persisted through an [`OrderRepository`] inside an [`Effect::Future`],
//! and the resulting event is fed back to update state.

use crate::catalog::TempleSummary;
use crate::effect::Effect;
use crate::environment::{Clock, StoreError, StoreFuture};
use crate::form::{FormResponse, FormSchema};
use crate::reducer::Reducer;
use crate::{SmallVec, smallvec};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Database identifier of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(i64);

impl OrderId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Database identifier of a temple service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(i64);

impl ServiceId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Newly submitted, awaiting the temple.
    Pending,
    /// Accepted by the temple.
    Confirmed,
    /// Ceremony performed.
    Completed,
    /// Withdrawn.
    Cancelled,
}

impl OrderStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Completed)
                | (Self::Pending | Self::Confirmed, Self::Cancelled)
        )
    }

    /// Completed and cancelled orders accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// `PlaceOrder` sent to a store that already holds an order.
    #[error("Order already placed")]
    AlreadyPlaced,

    /// A transition was requested before any order was loaded.
    #[error("No order loaded")]
    NotLoaded,

    /// The lifecycle does not allow this move.
    #[error("Cannot move order {id} from {from} to {to}")]
    InvalidTransition {
        /// Order being transitioned.
        id: OrderId,
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// The repository failed.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

/// A validated booking, ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Booking user.
    pub user_id: UserId,
    /// Booked service.
    pub service_id: ServiceId,
    /// Flattened form responses.
    pub responses: Vec<FormResponse>,
    /// The service's form as it was when the booking was made.
    pub form_snapshot: FormSchema,
    /// Appointment.
    pub date: NaiveDateTime,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier.
    pub id: OrderId,
    /// Booking user.
    pub user_id: UserId,
    /// Booked service.
    pub service_id: ServiceId,
    /// Flattened form responses.
    pub responses: Vec<FormResponse>,
    /// Form schema at booking time.
    pub form_snapshot: FormSchema,
    /// Current status.
    pub status: OrderStatus,
    /// Appointment.
    pub date: NaiveDateTime,
    /// When the temple confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the ceremony was marked done.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the order was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a freshly inserted order; always `pending`.
    #[must_use]
    pub fn placed(id: OrderId, new: NewOrder, at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            service_id: new.service_id,
            responses: new.responses,
            form_snapshot: new.form_snapshot,
            status: OrderStatus::Pending,
            date: new.date,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Move to `to`, stamping the matching timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidTransition`] when the lifecycle forbids the move.
    pub fn transition(&mut self, to: OrderStatus, at: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }

        match to {
            OrderStatus::Confirmed => self.confirmed_at = Some(at),
            OrderStatus::Completed => self.completed_at = Some(at),
            OrderStatus::Cancelled => self.cancelled_at = Some(at),
            OrderStatus::Pending => {}
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}

/// A user's booking as listed on their bookings page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingSummary {
    /// Order id.
    pub id: OrderId,
    /// Current status.
    pub status: OrderStatus,
    /// Appointment.
    pub date: NaiveDateTime,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Service type (e.g. `car`).
    pub service_type: String,
    /// Temple the service belongs to.
    pub temple_slug: String,
    /// Temple display name.
    pub temple_name: String,
}

/// One order joined with its service and temple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingDetail {
    /// The order itself.
    pub order: Order,
    /// Service type (e.g. `car`).
    pub service_type: String,
    /// The service's current form.
    pub service_form: FormSchema,
    /// Temple contact data.
    pub temple: TempleSummary,
}

/// Order persistence.
pub trait OrderRepository: Send + Sync {
    /// Insert a new `pending` order in a single statement.
    fn insert(&self, order: NewOrder, at: DateTime<Utc>) -> StoreFuture<'_, Order>;

    /// Load an order by id.
    fn load(&self, id: OrderId) -> StoreFuture<'_, Option<Order>>;

    /// Move an order from `from` to `to`, stamping the status timestamp.
    ///
    /// Fails with [`StoreError::Conflict`] when the stored status is no longer `from`.
    fn record_transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order>;

    /// The user's bookings, newest first.
    fn list_for_user<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<BookingSummary>>;

    /// One booking, only if it belongs to `user`.
    fn find_for_user<'a>(&'a self, user: &'a UserId, id: OrderId) -> StoreFuture<'a, Option<BookingDetail>>;
}

/// State of one order aggregate.
#[derive(Debug, Clone, Default)]
pub struct OrderState {
    /// The order, once placed or loaded.
    pub order: Option<Order>,
    /// Error from the last rejected command or failed write.
    pub last_error: Option<OrderError>,
}

impl OrderState {
    /// Empty state, used when placing a new order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with an existing order, used for transitions.
    #[must_use]
    pub const fn with_order(order: Order) -> Self {
        Self {
            order: Some(order),
            last_error: None,
        }
    }

    /// Current status, if an order is loaded.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.order.as_ref().map(|o| o.status)
    }
}

/// Actions of the order aggregate.
#[derive(Debug, Clone)]
pub enum OrderAction {
    // Commands
    /// Persist a new order.
    PlaceOrder {
        /// Validated booking.
        order: NewOrder,
    },
    /// `pending → confirmed`.
    ConfirmOrder,
    /// `confirmed → completed`.
    CompleteOrder,
    /// `pending|confirmed → cancelled`.
    CancelOrder,

    // Events
    /// The order was inserted.
    OrderPlaced {
        /// Stored order.
        order: Order,
    },
    /// The order was confirmed.
    OrderConfirmed {
        /// Stored order.
        order: Order,
    },
    /// The order was completed.
    OrderCompleted {
        /// Stored order.
        order: Order,
    },
    /// The order was cancelled.
    OrderCancelled {
        /// Stored order.
        order: Order,
    },
    /// A command was refused by the lifecycle rules.
    TransitionRejected {
        /// Why.
        error: OrderError,
    },
    /// A repository write failed.
    PersistenceFailed {
        /// Underlying error.
        error: StoreError,
    },
}

impl OrderAction {
    /// Whether this action is an event (as opposed to a command).
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !matches!(
            self,
            Self::PlaceOrder { .. } | Self::ConfirmOrder | Self::CompleteOrder | Self::CancelOrder
        )
    }
}

/// Dependencies of [`OrderReducer`].
#[derive(Clone)]
pub struct OrderEnvironment {
    /// Timestamps for inserts and transitions.
    pub clock: Arc<dyn Clock>,
    /// Order persistence.
    pub orders: Arc<dyn OrderRepository>,
}

impl OrderEnvironment {
    /// Creates a new `OrderEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { clock, orders }
    }
}

/// Reducer for the order aggregate.
#[derive(Clone, Debug, Default)]
pub struct OrderReducer;

impl OrderReducer {
    /// Creates a new `OrderReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_transition(state: &OrderState, to: OrderStatus) -> Result<(OrderId, OrderStatus), OrderError> {
        let Some(order) = &state.order else {
            return Err(OrderError::NotLoaded);
        };

        if !order.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                id: order.id,
                from: order.status,
                to,
            });
        }

        Ok((order.id, order.status))
    }

    fn transition_effect(
        state: &mut OrderState,
        to: OrderStatus,
        env: &OrderEnvironment,
    ) -> SmallVec<[Effect<OrderAction>; 4]> {
        let (id, from) = match Self::validate_transition(state, to) {
            Ok(found) => found,
            Err(error) => {
                Self::apply_event(state, &OrderAction::TransitionRejected { error });
                return SmallVec::new();
            }
        };

        let orders = Arc::clone(&env.orders);
        let at = env.clock.now();

        smallvec![Effect::future(async move {
            match orders.record_transition(id, from, to, at).await {
                Ok(order) => Some(match to {
                    OrderStatus::Confirmed => OrderAction::OrderConfirmed { order },
                    OrderStatus::Completed => OrderAction::OrderCompleted { order },
                    OrderStatus::Cancelled | OrderStatus::Pending => OrderAction::OrderCancelled { order },
                }),
                Err(error) => Some(OrderAction::PersistenceFailed { error }),
            }
        })]
    }

    fn apply_event(state: &mut OrderState, action: &OrderAction) {
        match action {
            OrderAction::OrderPlaced { order }
            | OrderAction::OrderConfirmed { order }
            | OrderAction::OrderCompleted { order }
            | OrderAction::OrderCancelled { order } => {
                state.order = Some(order.clone());
                state.last_error = None;
            }
            OrderAction::TransitionRejected { error } => {
                state.last_error = Some(error.clone());
            }
            OrderAction::PersistenceFailed { error } => {
                state.last_error = Some(OrderError::Persistence(error.clone()));
            }
            // Commands are not applied to state
            OrderAction::PlaceOrder { .. }
            | OrderAction::ConfirmOrder
            | OrderAction::CompleteOrder
            | OrderAction::CancelOrder => {}
        }
    }
}

impl Reducer for OrderReducer {
    type State = OrderState;
    type Action = OrderAction;
    type Environment = OrderEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            OrderAction::PlaceOrder { order } => {
                if state.order.is_some() {
                    Self::apply_event(
                        state,
                        &OrderAction::TransitionRejected {
                            error: OrderError::AlreadyPlaced,
                        },
                    );
                    return SmallVec::new();
                }

                let orders = Arc::clone(&env.orders);
                let at = env.clock.now();

                smallvec![Effect::future(async move {
                    match orders.insert(order, at).await {
                        Ok(order) => Some(OrderAction::OrderPlaced { order }),
                        Err(error) => Some(OrderAction::PersistenceFailed { error }),
                    }
                })]
            }

            OrderAction::ConfirmOrder => Self::transition_effect(state, OrderStatus::Confirmed, env),
            OrderAction::CompleteOrder => Self::transition_effect(state, OrderStatus::Completed, env),
            OrderAction::CancelOrder => Self::transition_effect(state, OrderStatus::Cancelled, env),

            // ========== Events ==========
            OrderAction::OrderPlaced { .. }
            | OrderAction::OrderConfirmed { .. }
            | OrderAction::OrderCompleted { .. }
            | OrderAction::OrderCancelled { .. }
            | OrderAction::TransitionRejected { .. }
            | OrderAction::PersistenceFailed { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            }
        }
    }
}
