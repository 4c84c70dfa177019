//! User profiles.
//!
//! Accounts and sessions are created by the external auth provider. This
//! service only reads a user's profile and lets the user edit the contact
//! details the provider does not own: name, phone, address and birth date.

use crate::environment::StoreFuture;
use crate::messages;
use crate::order::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Longest accepted name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Longest accepted address, in characters.
pub const MAX_ADDRESS_CHARS: usize = 500;

/// A user's profile as shown on the account page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id issued by the auth provider.
    pub id: UserId,
    /// Display name.
    pub name: Option<String>,
    /// Sign-in email.
    pub email: Option<String>,
    /// Avatar URL.
    pub image: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Postal address.
    pub address: Option<String>,
    /// Birth date.
    pub birth_date: Option<NaiveDate>,
    /// Account creation.
    pub created_at: DateTime<Utc>,
    /// Last profile change.
    pub updated_at: DateTime<Utc>,
}

/// Raw profile form input.
///
/// Blank optional fields clear the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    /// Name as entered.
    #[serde(default)]
    pub name: String,
    /// Phone as entered.
    #[serde(default)]
    pub phone: Option<String>,
    /// Address as entered.
    #[serde(default)]
    pub address: Option<String>,
    /// Birth date as entered, `YYYY-MM-DD`.
    #[serde(default)]
    pub birth_date: Option<String>,
}

/// Per-field problems with a [`ProfileInput`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} invalid profile field(s)", .errors.len())]
pub struct ProfileError {
    errors: BTreeMap<String, String>,
}

impl ProfileError {
    /// Invalid field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Localized messages keyed by field.
    #[must_use]
    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }
}

/// A validated profile change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Trimmed, non-empty name.
    pub name: String,
    /// Trimmed phone, `None` when blank.
    pub phone: Option<String>,
    /// Trimmed address, `None` when blank.
    pub address: Option<String>,
    /// Birth date, `None` when blank.
    pub birth_date: Option<NaiveDate>,
}

impl ProfileUpdate {
    /// Validate raw input; `today` bounds the birth date.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] listing every invalid field.
    pub fn validate(input: ProfileInput, today: NaiveDate) -> Result<Self, ProfileError> {
        let mut errors = BTreeMap::new();
        let mut reject = |field: &str, message: &str| {
            errors.insert(field.to_string(), message.to_string());
        };

        let name = input.name.trim().to_string();
        if name.is_empty() {
            reject("name", messages::NAME_REQUIRED);
        } else if name.chars().count() > MAX_NAME_CHARS {
            reject("name", messages::NAME_TOO_LONG);
        }

        let phone = blank_to_none(input.phone);
        if phone.as_deref().is_some_and(|p| !is_phone_number(p)) {
            reject("phone", messages::PHONE_INVALID);
        }

        let address = blank_to_none(input.address);
        if address.as_deref().is_some_and(|a| a.chars().count() > MAX_ADDRESS_CHARS) {
            reject("address", messages::ADDRESS_TOO_LONG);
        }

        let birth_date = match blank_to_none(input.birth_date) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) if date <= today => Some(date),
                _ => {
                    reject("birth_date", messages::BIRTH_DATE_INVALID);
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(ProfileError { errors });
        }
        Ok(Self {
            name,
            phone,
            address,
            birth_date,
        })
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Digits with optional spaces or dashes and a leading `+`; 9 to 15 digits.
fn is_phone_number(raw: &str) -> bool {
    let body = raw.strip_prefix('+').unwrap_or(raw);
    let digits = body.chars().filter(char::is_ascii_digit).count();
    body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') && (9..=15).contains(&digits)
}

/// Profile persistence.
pub trait UserRepository: Send + Sync {
    /// The user's profile, if the user exists.
    fn profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UserProfile>>;

    /// Overwrite the editable fields and stamp `updated_at`.
    ///
    /// Fails with `NotFound` when the user does not exist.
    fn update_profile<'a>(
        &'a self,
        user: &'a UserId,
        update: &'a ProfileUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, UserProfile>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn input(name: &str) -> ProfileInput {
        ProfileInput {
            name: name.to_string(),
            ..ProfileInput::default()
        }
    }

    #[test]
    fn blank_optionals_clear_and_name_is_trimmed() {
        let update = ProfileUpdate::validate(
            ProfileInput {
                name: "  สมชาย ใจดี ".into(),
                phone: Some(" ".into()),
                address: Some(String::new()),
                birth_date: Some(String::new()),
            },
            today(),
        )
        .unwrap();

        assert_eq!(update.name, "สมชาย ใจดี");
        assert_eq!(update.phone, None);
        assert_eq!(update.address, None);
        assert_eq!(update.birth_date, None);
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let err = ProfileUpdate::validate(
            ProfileInput {
                name: "   ".into(),
                phone: Some("08-abc".into()),
                address: Some("ก".repeat(MAX_ADDRESS_CHARS + 1)),
                birth_date: Some("2025-13-01".into()),
            },
            today(),
        )
        .unwrap_err();

        let errors = err.into_errors();
        assert_eq!(errors["name"], messages::NAME_REQUIRED);
        assert_eq!(errors["phone"], messages::PHONE_INVALID);
        assert_eq!(errors["address"], messages::ADDRESS_TOO_LONG);
        assert_eq!(errors["birth_date"], messages::BIRTH_DATE_INVALID);
    }

    #[test]
    fn name_length_counts_characters() {
        assert!(ProfileUpdate::validate(input(&"ก".repeat(MAX_NAME_CHARS)), today()).is_ok());
        let err = ProfileUpdate::validate(input(&"ก".repeat(MAX_NAME_CHARS + 1)), today()).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), ["name"]);
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let mut raw = input("Somchai");
        raw.birth_date = Some("2025-01-02".into());
        assert!(ProfileUpdate::validate(raw.clone(), today()).is_err());

        raw.birth_date = Some("1990-05-17".into());
        let update = ProfileUpdate::validate(raw, today()).unwrap();
        assert_eq!(update.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
    }

    #[test]
    fn phone_numbers() {
        for ok in ["0812345678", "+66 81 234 5678", "02-123-4567"] {
            assert!(is_phone_number(ok), "{ok}");
        }
        for bad in ["12345", "081234567890123456", "08x2345678", "++66812345678"] {
            assert!(!is_phone_number(bad), "{bad}");
        }
    }
}
