use crate::{PostgresBookingStore, db_error, decode_error, roll_back};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use temple_booking_core::environment::{StoreError, StoreFuture};
use temple_booking_core::order::UserId;
use temple_booking_core::review::{
    Rating, RatingSummary, Review, ReviewRepository, ReviewSubmission, ReviewWithAuthor, ReviewWriteOutcome,
};

fn row_to_review(row: &PgRow) -> Result<Review, StoreError> {
    let user_id: String = row.try_get("user_id").map_err(db_error)?;
    let rating: i16 = row.try_get("rating").map_err(db_error)?;
    Ok(Review {
        id: row.try_get("id").map_err(db_error)?,
        user_id: UserId::new(user_id),
        temple_slug: row.try_get("temple_slug").map_err(db_error)?,
        service_type: row.try_get("service_type").map_err(db_error)?,
        rating: Rating::new(i64::from(rating)).map_err(decode_error)?,
        comment: row.try_get("comment").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn row_to_summary(row: &PgRow, average: &str, count: &str) -> Result<RatingSummary, StoreError> {
    Ok(RatingSummary {
        average_rating: row.try_get(average).map_err(db_error)?,
        review_count: row.try_get(count).map_err(db_error)?,
    })
}

/// Lock the temple row for the rest of the transaction.
///
/// Returns `false` when the temple does not exist.
async fn lock_temple(conn: &mut PgConnection, temple_slug: &str) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT slug FROM temples WHERE slug = $1 FOR UPDATE")
        .bind(temple_slug)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(row.is_some())
}

/// Whether the temple offers `service_type`.
async fn service_offered(conn: &mut PgConnection, temple_slug: &str, service_type: &str) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT 1 FROM services WHERE temple_slug = $1 AND service_type = $2")
        .bind(temple_slug)
        .bind(service_type)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(row.is_some())
}

/// Rewrite the temple's stored aggregate from a full scan of its reviews.
async fn recompute_temple_rating(
    conn: &mut PgConnection,
    temple_slug: &str,
    at: DateTime<Utc>,
) -> Result<RatingSummary, StoreError> {
    let row = sqlx::query(
        r"
        UPDATE temples
        SET rating = COALESCE((SELECT AVG(rating)::float8 FROM reviews WHERE temple_slug = $1), 0),
            review_count = (SELECT COUNT(*) FROM reviews WHERE temple_slug = $1),
            updated_at = $2
        WHERE slug = $1
        RETURNING rating, review_count
        ",
    )
    .bind(temple_slug)
    .bind(at)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;

    row_to_summary(&row, "rating", "review_count")
}

impl PostgresBookingStore {
    async fn upsert_review(&self, submission: ReviewSubmission, at: DateTime<Utc>) -> Result<ReviewWriteOutcome, StoreError> {
        // Every concurrent writer for this temple queues on the row lock, so the
        // aggregate always reflects the reviews committed before it.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {e}")))?;

        if !lock_temple(&mut tx, &submission.temple_slug).await? {
            roll_back(tx, "review for unknown temple").await;
            return Err(StoreError::not_found("temple", &submission.temple_slug));
        }
        if !service_offered(&mut tx, &submission.temple_slug, &submission.service_type).await? {
            roll_back(tx, "review for unknown service").await;
            return Err(StoreError::not_found(
                "service",
                format!("{}/{}", submission.temple_slug, submission.service_type),
            ));
        }

        let row = sqlx::query(
            r"
            INSERT INTO reviews (user_id, temple_slug, service_type, rating, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (user_id, temple_slug, service_type) DO UPDATE SET
                rating = EXCLUDED.rating,
                comment = EXCLUDED.comment,
                updated_at = EXCLUDED.updated_at
            RETURNING id, user_id, temple_slug, service_type, rating, comment, created_at, updated_at,
                      (xmax = 0) AS created
            ",
        )
        .bind(submission.user_id.as_str())
        .bind(&submission.temple_slug)
        .bind(&submission.service_type)
        .bind(i16::from(submission.rating.get()))
        .bind(submission.comment.as_deref())
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let review = row_to_review(&row)?;
        let created: bool = row.try_get("created").map_err(db_error)?;
        let temple_rating = recompute_temple_rating(&mut tx, &submission.temple_slug, at).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {e}")))?;

        tracing::info!(
            review_id = review.id,
            temple = %review.temple_slug,
            service_type = %review.service_type,
            created,
            average_rating = temple_rating.average_rating,
            review_count = temple_rating.review_count,
            "Review saved"
        );
        metrics::counter!("postgres.reviews.upserted", "created" => created.to_string()).increment(1);

        Ok(ReviewWriteOutcome {
            review,
            created,
            temple_rating,
        })
    }

    async fn refresh_rating(&self, temple_slug: &str, at: DateTime<Utc>) -> Result<RatingSummary, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {e}")))?;

        if !lock_temple(&mut tx, temple_slug).await? {
            roll_back(tx, "refresh of unknown temple").await;
            return Err(StoreError::not_found("temple", temple_slug));
        }
        let summary = recompute_temple_rating(&mut tx, temple_slug, at).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {e}")))?;

        tracing::info!(
            temple = %temple_slug,
            average_rating = summary.average_rating,
            review_count = summary.review_count,
            "Temple rating refreshed"
        );
        Ok(summary)
    }

    async fn reviews_for(&self, temple_slug: &str, service_type: &str) -> Result<Vec<ReviewWithAuthor>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT r.id, r.user_id, r.temple_slug, r.service_type, r.rating, r.comment,
                   r.created_at, r.updated_at, u.name AS author_name, u.image AS author_image
            FROM reviews r
            LEFT JOIN users u ON u.id = r.user_id
            WHERE r.temple_slug = $1 AND r.service_type = $2
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(temple_slug)
        .bind(service_type)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(ReviewWithAuthor {
                    review: row_to_review(row)?,
                    author_name: row.try_get("author_name").map_err(db_error)?,
                    author_image: row.try_get("author_image").map_err(db_error)?,
                })
            })
            .collect()
    }

    async fn review_by(&self, user: &UserId, temple_slug: &str, service_type: &str) -> Result<Option<Review>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, temple_slug, service_type, rating, comment, created_at, updated_at
            FROM reviews
            WHERE user_id = $1 AND temple_slug = $2 AND service_type = $3
            ",
        )
        .bind(user.as_str())
        .bind(temple_slug)
        .bind(service_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_review).transpose()
    }

    async fn live_service_rating(&self, temple_slug: &str, service_type: &str) -> Result<RatingSummary, StoreError> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(AVG(rating)::float8, 0) AS average_rating, COUNT(*) AS review_count
            FROM reviews
            WHERE temple_slug = $1 AND service_type = $2
            ",
        )
        .bind(temple_slug)
        .bind(service_type)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        row_to_summary(&row, "average_rating", "review_count")
    }

    async fn stored_temple_rating(&self, temple_slug: &str) -> Result<RatingSummary, StoreError> {
        let row = sqlx::query("SELECT rating, review_count FROM temples WHERE slug = $1")
            .bind(temple_slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::not_found("temple", temple_slug))?;

        row_to_summary(&row, "rating", "review_count")
    }
}

impl ReviewRepository for PostgresBookingStore {
    fn submit_review(&self, submission: ReviewSubmission, at: DateTime<Utc>) -> StoreFuture<'_, ReviewWriteOutcome> {
        Box::pin(self.upsert_review(submission, at))
    }

    fn refresh_temple_rating<'a>(&'a self, temple_slug: &'a str, at: DateTime<Utc>) -> StoreFuture<'a, RatingSummary> {
        Box::pin(self.refresh_rating(temple_slug, at))
    }

    fn list_reviews<'a>(
        &'a self,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Vec<ReviewWithAuthor>> {
        Box::pin(self.reviews_for(temple_slug, service_type))
    }

    fn user_review<'a>(
        &'a self,
        user: &'a UserId,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<Review>> {
        Box::pin(self.review_by(user, temple_slug, service_type))
    }

    fn service_rating<'a>(&'a self, temple_slug: &'a str, service_type: &'a str) -> StoreFuture<'a, RatingSummary> {
        Box::pin(self.live_service_rating(temple_slug, service_type))
    }

    fn temple_rating<'a>(&'a self, temple_slug: &'a str) -> StoreFuture<'a, RatingSummary> {
        Box::pin(self.stored_temple_rating(temple_slug))
    }
}
