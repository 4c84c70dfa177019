//! `PostgreSQL` persistence for the temple booking service.
//!
//! [`PostgresBookingStore`] implements every repository trait from
//! `temple-booking-core` over a single `sqlx` connection pool:
//!
//! - order inserts (one statement) and lock-guarded status transitions
//! - review upserts that recompute the temple's rating aggregate in the same
//!   transaction, with the temple row locked for the duration
//! - catalog and session reads, and the user profile read and update
//!
//! # Example
//!
//! ```ignore
//! use temple_booking_postgres::{PoolConfig, PostgresBookingStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresBookingStore::connect(&PoolConfig::new("postgres://localhost/temples")).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod orders;
mod reviews;
mod users;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Row, Transaction};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use temple_booking_core::catalog::{GeoPoint, Temple};
use temple_booking_core::environment::StoreError;
use temple_booking_core::form::FormSchema;
use temple_booking_core::order::{ServiceId, UserId};

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a connection.
    pub connect_timeout: Duration,
    /// Idle connections older than this are closed.
    pub idle_timeout: Duration,
}

impl PoolConfig {
    /// Settings for `url` with the default pool sizes.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Booking store backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be reached.
    pub async fn connect(config: &PoolConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or update a user profile.
    ///
    /// Users are owned by the external auth provider; this exists for seeding.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn upsert_user(&self, id: &UserId, name: Option<&str>, image: Option<&str>) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO users (id, name, image)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, image = EXCLUDED.image
            ",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(image)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Store a session token for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn insert_session(&self, token: &str, user: &UserId, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(user.as_str())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Insert or update a temple's descriptive columns.
    ///
    /// The rating aggregate is left untouched on update.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    pub async fn upsert_temple(&self, temple: &Temple) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO temples
                (slug, name, thumbnails, information, address, latitude, longitude, phone, open_time, close_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                thumbnails = EXCLUDED.thumbnails,
                information = EXCLUDED.information,
                address = EXCLUDED.address,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                phone = EXCLUDED.phone,
                open_time = EXCLUDED.open_time,
                close_time = EXCLUDED.close_time,
                updated_at = now()
            ",
        )
        .bind(&temple.slug)
        .bind(&temple.name)
        .bind(sqlx::types::Json(&temple.thumbnails))
        .bind(&temple.information)
        .bind(&temple.address)
        .bind(temple.location.latitude)
        .bind(temple.location.longitude)
        .bind(temple.phone.as_deref())
        .bind(&temple.open_time)
        .bind(&temple.close_time)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Insert or replace the form of a temple's service, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure, e.g. an unknown temple.
    pub async fn upsert_service(
        &self,
        temple_slug: &str,
        service_type: &str,
        form: &FormSchema,
    ) -> Result<ServiceId, StoreError> {
        let id: (i64,) = sqlx::query_as(
            r"
            INSERT INTO services (temple_slug, service_type, forms)
            VALUES ($1, $2, $3)
            ON CONFLICT (temple_slug, service_type) DO UPDATE SET forms = EXCLUDED.forms, updated_at = now()
            RETURNING id
            ",
        )
        .bind(temple_slug)
        .bind(service_type)
        .bind(form.to_json())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(ServiceId::new(id.0))
    }
}

/// Abandon `tx`; a failed rollback is logged, the connection is discarded either way.
async fn roll_back(tx: Transaction<'_, Postgres>, reason: &'static str) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(reason, error = %e, "Failed to roll back transaction");
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn decode_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(e.to_string())
}

fn json_column<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let value: serde_json::Value = row.try_get(column).map_err(db_error)?;
    serde_json::from_value(value).map_err(decode_error)
}

fn form_column(row: &PgRow, column: &str) -> Result<FormSchema, StoreError> {
    let value: serde_json::Value = row.try_get(column).map_err(db_error)?;
    Ok(FormSchema::from_json(value)?)
}

fn row_to_temple(row: &PgRow) -> Result<Temple, StoreError> {
    Ok(Temple {
        slug: row.try_get("slug").map_err(db_error)?,
        name: row.try_get("name").map_err(db_error)?,
        thumbnails: json_column(row, "thumbnails")?,
        information: row.try_get("information").map_err(db_error)?,
        address: row.try_get("address").map_err(db_error)?,
        location: GeoPoint::new(
            row.try_get("latitude").map_err(db_error)?,
            row.try_get("longitude").map_err(db_error)?,
        ),
        phone: row.try_get("phone").map_err(db_error)?,
        rating: row.try_get("rating").map_err(db_error)?,
        review_count: row.try_get("review_count").map_err(db_error)?,
        open_time: row.try_get("open_time").map_err(db_error)?,
        close_time: row.try_get("close_time").map_err(db_error)?,
    })
}
