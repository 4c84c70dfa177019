use crate::{PostgresBookingStore, db_error, form_column, row_to_temple};
use sqlx::Row;
use sqlx::postgres::PgRow;
use temple_booking_core::catalog::{CatalogRepository, Service, SessionRepository, TempleServiceDetail};
use temple_booking_core::environment::{StoreError, StoreFuture};
use temple_booking_core::order::{ServiceId, UserId};

const SERVICE_WITH_TEMPLE: &str = r"
    SELECT s.id AS service_id, s.service_type, s.forms,
           t.slug, t.name, t.thumbnails, t.information, t.address, t.latitude, t.longitude,
           t.phone, t.rating, t.review_count, t.open_time, t.close_time
    FROM services s
    JOIN temples t ON t.slug = s.temple_slug
";

fn row_to_detail(row: &PgRow) -> Result<TempleServiceDetail, StoreError> {
    let temple = row_to_temple(row)?;
    let service = Service {
        id: ServiceId::new(row.try_get("service_id").map_err(db_error)?),
        temple_slug: temple.slug.clone(),
        service_type: row.try_get("service_type").map_err(db_error)?,
        form: form_column(row, "forms")?,
    };
    Ok(TempleServiceDetail { temple, service })
}

/// Keep the rows that decode; a service whose stored form no longer decodes is
/// left out of the listing instead of failing it. Any other error still fails.
fn bookable(
    service_type: &str,
    rows: impl Iterator<Item = Result<TempleServiceDetail, StoreError>>,
) -> Result<Vec<TempleServiceDetail>, StoreError> {
    let mut details = Vec::new();
    for row in rows {
        match row {
            Ok(detail) => details.push(detail),
            Err(StoreError::Schema(e)) => {
                tracing::warn!(service_type, error = %e, "Skipping service with an undecodable form");
                metrics::counter!("postgres.catalog.undecodable_forms").increment(1);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(details)
}

impl PostgresBookingStore {
    async fn details_by_type(&self, service_type: &str) -> Result<Vec<TempleServiceDetail>, StoreError> {
        let sql = format!("{SERVICE_WITH_TEMPLE} WHERE s.service_type = $1 ORDER BY t.name, t.slug");
        let rows = sqlx::query(&sql)
            .bind(service_type)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        bookable(service_type, rows.iter().map(row_to_detail))
    }

    async fn detail_of(&self, temple_slug: &str, service_type: &str) -> Result<Option<TempleServiceDetail>, StoreError> {
        let sql = format!("{SERVICE_WITH_TEMPLE} WHERE t.slug = $1 AND s.service_type = $2");
        let row = sqlx::query(&sql)
            .bind(temple_slug)
            .bind(service_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_detail).transpose()
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn session_user(&self, token: &str) -> Result<Option<UserId>, StoreError> {
        let user: Option<(String,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token = $1 AND expires_at > now()")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        Ok(user.map(|(id,)| UserId::new(id)))
    }
}

impl CatalogRepository for PostgresBookingStore {
    fn services_by_type<'a>(&'a self, service_type: &'a str) -> StoreFuture<'a, Vec<TempleServiceDetail>> {
        Box::pin(self.details_by_type(service_type))
    }

    fn temple_service<'a>(
        &'a self,
        temple_slug: &'a str,
        service_type: &'a str,
    ) -> StoreFuture<'a, Option<TempleServiceDetail>> {
        Box::pin(self.detail_of(temple_slug, service_type))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.check_connection())
    }
}

impl SessionRepository for PostgresBookingStore {
    fn resolve_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<UserId>> {
        Box::pin(self.session_user(token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use temple_booking_core::catalog::{GeoPoint, Temple};
    use temple_booking_core::form::{FormSchema, SchemaError};

    fn detail(slug: &str) -> TempleServiceDetail {
        TempleServiceDetail {
            temple: Temple {
                slug: slug.to_string(),
                name: slug.to_string(),
                thumbnails: Vec::new(),
                information: String::new(),
                address: String::new(),
                location: GeoPoint::new(13.7, 100.5),
                phone: None,
                rating: 0.0,
                review_count: 0,
                open_time: "06:00".to_string(),
                close_time: "18:00".to_string(),
            },
            service: Service {
                id: ServiceId::new(1),
                temple_slug: slug.to_string(),
                service_type: "car".to_string(),
                form: FormSchema::default(),
            },
        }
    }

    fn slider() -> StoreError {
        StoreError::Schema(SchemaError::UnsupportedFieldType {
            key: "speed".to_string(),
            field_type: "slider".to_string(),
        })
    }

    #[test]
    fn undecodable_form_drops_only_its_row() {
        let rows = vec![Ok(detail("wat-arun")), Err(slider()), Ok(detail("wat-pho"))];

        let kept = bookable("car", rows.into_iter()).unwrap();

        let slugs: Vec<_> = kept.iter().map(|d| d.temple.slug.as_str()).collect();
        assert_eq!(slugs, ["wat-arun", "wat-pho"]);
    }

    #[test]
    fn database_errors_still_fail_the_listing() {
        let rows = vec![Ok(detail("wat-arun")), Err(StoreError::Database("reset".to_string()))];

        assert!(matches!(bookable("car", rows.into_iter()), Err(StoreError::Database(_))));
    }
}
