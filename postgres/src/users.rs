use crate::{PostgresBookingStore, db_error};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use temple_booking_core::environment::{StoreError, StoreFuture};
use temple_booking_core::order::UserId;
use temple_booking_core::user::{ProfileUpdate, UserProfile, UserRepository};

const PROFILE_COLUMNS: &str = "id, name, email, image, phone, address, birth_date, created_at, updated_at";

fn row_to_profile(row: &PgRow) -> Result<UserProfile, StoreError> {
    Ok(UserProfile {
        id: UserId::new(row.try_get::<String, _>("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        email: row.try_get("email").map_err(db_error)?,
        image: row.try_get("image").map_err(db_error)?,
        phone: row.try_get("phone").map_err(db_error)?,
        address: row.try_get("address").map_err(db_error)?,
        birth_date: row.try_get("birth_date").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

impl PostgresBookingStore {
    async fn fetch_profile(&self, user: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_profile).transpose()
    }

    async fn write_profile(
        &self,
        user: &UserId,
        update: &ProfileUpdate,
        at: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let sql = format!(
            "UPDATE users SET name = $2, phone = $3, address = $4, birth_date = $5, updated_at = $6
             WHERE id = $1
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .bind(&update.name)
            .bind(update.phone.as_deref())
            .bind(update.address.as_deref())
            .bind(update.birth_date)
            .bind(at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let row = row.ok_or_else(|| StoreError::not_found("user", user))?;
        row_to_profile(&row)
    }
}

impl UserRepository for PostgresBookingStore {
    fn profile<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Option<UserProfile>> {
        Box::pin(self.fetch_profile(user))
    }

    fn update_profile<'a>(
        &'a self,
        user: &'a UserId,
        update: &'a ProfileUpdate,
        at: DateTime<Utc>,
    ) -> StoreFuture<'a, UserProfile> {
        Box::pin(self.write_profile(user, update, at))
    }
}
