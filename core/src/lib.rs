//! # Temple Booking Core
//!
//! Domain types and pure business logic for the temple-service booking platform.
//!
//! Users browse ritual services offered by temples, submit a booking form whose
//! fields are stored as data, and leave one review per temple service. This crate
//! holds everything that can be decided without I/O:
//!
//! - **Form Schema Model** ([`form`]): field definitions decoded from JSON into a sum type
//! - **Dynamic Form Engine** ([`form::FormEngine`]): render descriptors and submit-time validation
//! - **Order lifecycle** ([`order`]): the order status state machine as a [`reducer::Reducer`]
//! - **Reviews** ([`review`]): rating/comment validation and aggregate arithmetic
//! - **Catalog** ([`catalog`]): temples, services and the read-side views joining them
//! - **Profiles** ([`user`]): the signed-in user's own account details
//!
//! Persistence is reached only through the repository traits declared next to each
//! domain type. Implementations live in `temple-booking-postgres` (production) and
//! `temple-booking-testing` (in-memory).
//!
//! Reducers never perform I/O themselves. They mutate state and hand back
//! [`effect::Effect`] values; `temple-booking-runtime` runs those and feeds the
//! resulting events back in.
//!
//! ```ignore
//! use temple_booking_core::order::{OrderAction, OrderReducer, OrderState};
//! use temple_booking_core::reducer::Reducer;
//!
//! let mut state = OrderState::new();
//! let effects = OrderReducer::new().reduce(&mut state, OrderAction::PlaceOrder { order }, &env);
//! // one Future effect: insert the row, then emit OrderPlaced
//! ```

pub use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod catalog;
pub mod form;
pub mod messages;
pub mod order;
pub mod review;
pub mod user;

/// The state-machine abstraction shared by the domain aggregates.
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// Folds one action into `State`, returning the work still to be done.
    ///
    /// Implementations decide synchronously (reject, mutate, or schedule) and
    /// describe any persistence as effects built from `Environment`. Most
    /// actions yield zero or one effect, hence the inline capacity of four.
    pub trait Reducer {
        /// Aggregate state.
        type State;
        /// Commands and events.
        type Action;
        /// Injected clock and repositories.
        type Environment;

        /// Apply `action` to `state`.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Work a reducer asks the runtime to perform.
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// A deferred side effect. Nothing runs until a runtime executes it.
    pub enum Effect<Action> {
        /// Nothing to do.
        None,
        /// Children may run concurrently.
        Parallel(Vec<Effect<Action>>),
        /// Children run one after another.
        Sequential(Vec<Effect<Action>>),
        /// Dispatch `action` after `duration`.
        Delay {
            /// Wait before dispatching.
            duration: Duration,
            /// Dispatched once the wait is over.
            action: Box<Action>,
        },
        /// Async work whose `Some` output is dispatched back.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action: fmt::Debug> fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::None => f.write_str("Effect::None"),
                Self::Parallel(children) => f.debug_tuple("Effect::Parallel").field(children).finish(),
                Self::Sequential(children) => f.debug_tuple("Effect::Sequential").field(children).finish(),
                Self::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                // futures have no useful Debug
                Self::Future(_) => f.write_str("Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Group effects that may run concurrently.
        #[must_use]
        pub const fn merge(children: Vec<Self>) -> Self {
            Self::Parallel(children)
        }

        /// Group effects that must run in order.
        #[must_use]
        pub const fn chain(children: Vec<Self>) -> Self {
            Self::Sequential(children)
        }

        /// Box `fut` into a [`Effect::Future`].
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Self::Future(Box::pin(fut))
        }
    }
}

/// Clock and repository plumbing injected into reducers and services.
///
/// Repository methods return [`StoreFuture`](environment::StoreFuture) so the
/// traits stay object safe; effects capture `Arc<dyn OrderRepository>`.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::future::Future;
    use std::pin::Pin;
    use thiserror::Error;

    /// Source of "now" for timestamps and the booking calendar.
    pub trait Clock: Send + Sync {
        /// Current instant.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Errors raised by repository implementations.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// The referenced row does not exist.
        #[error("{entity} not found: {id}")]
        NotFound {
            /// Entity kind (e.g. "temple").
            entity: &'static str,
            /// Identifier that was looked up.
            id: String,
        },

        /// A stored value could not be decoded into a domain type.
        #[error("Serialization error: {0}")]
        Serialization(String),

        /// A stored form schema failed to decode.
        #[error(transparent)]
        Schema(#[from] crate::form::SchemaError),

        /// A conditional write lost a race (e.g. the order changed status meanwhile).
        #[error("Conflict: {0}")]
        Conflict(String),

        /// Database connection or query failure.
        #[error("Database error: {0}")]
        Database(String),
    }

    impl StoreError {
        /// Build a `NotFound` error.
        pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
            Self::NotFound {
                entity,
                id: id.to_string(),
            }
        }
    }

    /// Boxed future returned by repository methods.
    pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, StoreError, SystemClock};

    #[test]
    fn effect_debug_hides_future_body() {
        let effect: Effect<u8> = Effect::future(async { Some(1) });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[test]
    fn merge_and_chain_wrap_effects() {
        let merged: Effect<u8> = Effect::merge(vec![Effect::None, Effect::None]);
        assert!(matches!(merged, Effect::Parallel(ref e) if e.len() == 2));

        let chained: Effect<u8> = Effect::chain(vec![Effect::None]);
        assert!(matches!(chained, Effect::Sequential(ref e) if e.len() == 1));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = StoreError::not_found("temple", "wat-arun");
        assert_eq!(err.to_string(), "temple not found: wat-arun");
    }
}
