//! Test support for the temple booking crates.
//!
//! - [`InMemoryBookingStore`] stands in for Postgres behind every repository trait
//! - [`fixtures`] seeds Wat Arun with its car-blessing form
//! - [`ReducerTest`] dispatches actions by hand and settles their effects
//! - [`FixedClock`] pins "now" to 2025-01-01 UTC
//!
//! ```ignore
//! let store = InMemoryBookingStore::new();
//! fixtures::seed_wat_arun(&store);
//!
//! let outcome = store.submit_review(submission, test_clock().now()).await?;
//! assert_eq!(outcome.temple_rating.review_count, 1);
//! ```

use chrono::{DateTime, Utc};
use temple_booking_core::environment::Clock;

pub mod fixtures;
mod in_memory;

/// Deterministic [`Clock`] implementations.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// A clock that only moves when told to.
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use temple_booking_core::environment::Clock;
    /// use temple_booking_testing::mocks::FixedClock;
    ///
    /// let start = Utc::now();
    /// let clock = FixedClock::new(start);
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now() - start, Duration::hours(1));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Clock reading `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time: Mutex::new(time) }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Clock fixed at 2025-01-01 00:00 UTC, which is 07:00 the same day in Bangkok.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

pub use in_memory::InMemoryBookingStore;
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_on_new_year_2025() {
        assert_eq!(test_clock().now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(test_clock().now(), test_clock().now());
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = test_clock();
        let before = clock.now();
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now() - before, chrono::Duration::minutes(5));
    }
}
