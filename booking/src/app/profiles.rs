//! The signed-in user's own profile.

use super::{BookingCalendar, ServiceError};
use std::sync::Arc;
use temple_booking_core::environment::{Clock, StoreError};
use temple_booking_core::messages;
use temple_booking_core::order::UserId;
use temple_booking_core::user::{ProfileInput, ProfileUpdate, UserProfile, UserRepository};
use tracing::{error, info, warn};

const USER_NOT_FOUND: &str = "User not found";

/// Profile reads and edits.
pub struct ProfileService {
    users: Arc<dyn UserRepository>,
    calendar: BookingCalendar,
}

impl ProfileService {
    /// Creates a new `ProfileService`
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, calendar: BookingCalendar) -> Self {
        Self { users, calendar }
    }

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the session outlived its user.
    pub async fn profile(&self, user: &UserId) -> Result<UserProfile, ServiceError> {
        self.users
            .profile(user)
            .await?
            .ok_or(ServiceError::NotFound(USER_NOT_FOUND))
    }

    /// Validate and store the caller's editable profile fields.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Invalid`] with per-field messages
    /// - [`ServiceError::NotFound`] when the user no longer exists
    /// - [`ServiceError::SaveFailed`] when the write fails
    pub async fn update(&self, user: &UserId, input: ProfileInput) -> Result<UserProfile, ServiceError> {
        let update = ProfileUpdate::validate(input, self.calendar.today()).map_err(|e| {
            warn!(user_id = %user, fields = ?e.fields().collect::<Vec<_>>(), "Profile update rejected");
            ServiceError::Invalid {
                message: messages::PROFILE_INVALID.to_string(),
                errors: e.into_errors(),
            }
        })?;

        match self.users.update_profile(user, &update, self.calendar.clock().now()).await {
            Ok(profile) => {
                info!(user_id = %user, "Profile updated");
                Ok(profile)
            }
            Err(StoreError::NotFound { .. }) => Err(ServiceError::NotFound(USER_NOT_FOUND)),
            Err(e) => {
                error!(user_id = %user, error = %e, "Failed to update profile");
                Err(ServiceError::SaveFailed {
                    message: messages::PROFILE_SAVE_FAILED,
                    detail: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use temple_booking_testing::{InMemoryBookingStore, fixtures, test_clock};

    fn service(store: &InMemoryBookingStore) -> ProfileService {
        let calendar = BookingCalendar::new(Arc::new(test_clock()), FixedOffset::east_opt(7 * 3600).unwrap());
        ProfileService::new(Arc::new(store.clone()), calendar)
    }

    fn input(name: &str, birth_date: &str) -> ProfileInput {
        ProfileInput {
            name: name.to_string(),
            phone: Some("081-234-5678".to_string()),
            address: Some("  ".to_string()),
            birth_date: Some(birth_date.to_string()),
        }
    }

    #[tokio::test]
    async fn update_stores_trimmed_fields() {
        let store = InMemoryBookingStore::new();
        let user = fixtures::sign_in(&store, "u1", "token-1");

        let profile = service(&store)
            .update(&user, input(" สมหญิง ", "1990-05-17"))
            .await
            .unwrap();

        assert_eq!(profile.name.as_deref(), Some("สมหญิง"));
        assert_eq!(profile.phone.as_deref(), Some("081-234-5678"));
        assert_eq!(profile.address, None);
        assert_eq!(profile.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(profile.updated_at, test_clock().now());
        assert_eq!(store.user(&user).unwrap(), profile);
    }

    #[tokio::test]
    async fn invalid_input_changes_nothing() {
        let store = InMemoryBookingStore::new();
        let user = fixtures::sign_in(&store, "u1", "token-1");
        let before = store.user(&user).unwrap();

        let err = service(&store).update(&user, input("", "2030-01-01")).await.unwrap_err();

        let ServiceError::Invalid { message, errors } = err else {
            panic!("expected validation failure, got {err:?}");
        };
        assert_eq!(message, messages::PROFILE_INVALID);
        assert_eq!(errors["name"], messages::NAME_REQUIRED);
        assert_eq!(errors["birth_date"], messages::BIRTH_DATE_INVALID);
        assert_eq!(store.user(&user).unwrap(), before);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let store = InMemoryBookingStore::new();
        let ghost = UserId::new("ghost");
        let profiles = service(&store);

        assert!(matches!(
            profiles.profile(&ghost).await.unwrap_err(),
            ServiceError::NotFound(USER_NOT_FOUND)
        ));
        assert!(matches!(
            profiles.update(&ghost, input("Ghost", "")).await.unwrap_err(),
            ServiceError::NotFound(USER_NOT_FOUND)
        ));
    }

    #[tokio::test]
    async fn failed_write_is_localized() {
        let store = InMemoryBookingStore::new();
        let user = fixtures::sign_in(&store, "u1", "token-1");
        store.fail_writes(true);

        let err = service(&store).update(&user, input("สมหญิง", "")).await.unwrap_err();

        assert!(matches!(
            err,
            ServiceError::SaveFailed {
                message: messages::PROFILE_SAVE_FAILED,
                ..
            }
        ));
    }
}
