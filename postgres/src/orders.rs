use crate::{PostgresBookingStore, db_error, decode_error, form_column, json_column, roll_back};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use temple_booking_core::catalog::TempleSummary;
use temple_booking_core::environment::{StoreError, StoreFuture};
use temple_booking_core::order::{
    BookingDetail, BookingSummary, NewOrder, Order, OrderId, OrderRepository, OrderStatus, ServiceId, UserId,
};

const FOREIGN_KEY_SERVICE: &str = "orders_service_id_fkey";

fn status_column(row: &PgRow, column: &str) -> Result<OrderStatus, StoreError> {
    let raw: String = row.try_get(column).map_err(db_error)?;
    OrderStatus::parse(&raw).ok_or_else(|| decode_error(format!("unknown order status: {raw}")))
}

fn row_to_order(row: &PgRow) -> Result<Order, StoreError> {
    let user_id: String = row.try_get("user_id").map_err(db_error)?;
    Ok(Order {
        id: OrderId::new(row.try_get("id").map_err(db_error)?),
        user_id: UserId::new(user_id),
        service_id: ServiceId::new(row.try_get("service_id").map_err(db_error)?),
        responses: json_column(row, "responses")?,
        form_snapshot: form_column(row, "form_snapshot")?,
        status: status_column(row, "status")?,
        date: row.try_get("date").map_err(db_error)?,
        confirmed_at: row.try_get("confirmed_at").map_err(db_error)?,
        completed_at: row.try_get("completed_at").map_err(db_error)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

impl PostgresBookingStore {
    async fn insert_order(&self, order: NewOrder, at: DateTime<Utc>) -> Result<Order, StoreError> {
        let result: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r"
            INSERT INTO orders (user_id, service_id, responses, form_snapshot, status, date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $6)
            RETURNING id
            ",
        )
        .bind(order.user_id.as_str())
        .bind(order.service_id.get())
        .bind(sqlx::types::Json(&order.responses))
        .bind(order.form_snapshot.to_json())
        .bind(order.date)
        .bind(at)
        .fetch_one(&self.pool)
        .await;

        let id = match result {
            Ok((id,)) => OrderId::new(id),
            Err(sqlx::Error::Database(e)) if e.constraint() == Some(FOREIGN_KEY_SERVICE) => {
                return Err(StoreError::not_found("service", order.service_id));
            }
            Err(e) => return Err(db_error(e)),
        };

        tracing::info!(
            order_id = %id,
            user_id = %order.user_id,
            service_id = %order.service_id,
            "Order inserted"
        );
        metrics::counter!("postgres.orders.inserted").increment(1);

        Ok(Order::placed(id, order, at))
    }

    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, service_id, responses, form_snapshot, status, date,
                   confirmed_at, completed_at, cancelled_at, created_at, updated_at
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to start transaction: {e}")))?;

        let row = sqlx::query(
            r"
            SELECT id, user_id, service_id, responses, form_snapshot, status, date,
                   confirmed_at, completed_at, cancelled_at, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            roll_back(tx, "transition of unknown order").await;
            return Err(StoreError::not_found("order", id));
        };
        let mut order = row_to_order(&row)?;

        if order.status != from {
            roll_back(tx, "stale order status").await;
            return Err(StoreError::Conflict(format!(
                "order {id} is {}, expected {from}",
                order.status
            )));
        }
        if let Err(e) = order.transition(to, at) {
            roll_back(tx, "forbidden order transition").await;
            return Err(StoreError::Conflict(e.to_string()));
        }

        sqlx::query(
            r"
            UPDATE orders
            SET status = $2, confirmed_at = $3, completed_at = $4, cancelled_at = $5, updated_at = $6
            WHERE id = $1
            ",
        )
        .bind(id.get())
        .bind(order.status.as_str())
        .bind(order.confirmed_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {e}")))?;

        tracing::info!(order_id = %id, %from, %to, "Order status changed");
        metrics::counter!("postgres.orders.transitioned", "to" => to.as_str()).increment(1);

        Ok(order)
    }

    async fn bookings_of(&self, user: &UserId) -> Result<Vec<BookingSummary>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT o.id, o.status, o.date, o.created_at, s.service_type, t.slug, t.name
            FROM orders o
            JOIN services s ON s.id = o.service_id
            JOIN temples t ON t.slug = s.temple_slug
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            ",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                Ok(BookingSummary {
                    id: OrderId::new(row.try_get("id").map_err(db_error)?),
                    status: status_column(row, "status")?,
                    date: row.try_get("date").map_err(db_error)?,
                    created_at: row.try_get("created_at").map_err(db_error)?,
                    service_type: row.try_get("service_type").map_err(db_error)?,
                    temple_slug: row.try_get("slug").map_err(db_error)?,
                    temple_name: row.try_get("name").map_err(db_error)?,
                })
            })
            .collect()
    }

    async fn booking_of(&self, user: &UserId, id: OrderId) -> Result<Option<BookingDetail>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT o.id, o.user_id, o.service_id, o.responses, o.form_snapshot, o.status, o.date,
                   o.confirmed_at, o.completed_at, o.cancelled_at, o.created_at, o.updated_at,
                   s.service_type, s.forms,
                   t.slug, t.name, t.address, t.phone, t.thumbnails
            FROM orders o
            JOIN services s ON s.id = o.service_id
            JOIN temples t ON t.slug = s.temple_slug
            WHERE o.id = $1 AND o.user_id = $2
            ",
        )
        .bind(id.get())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let thumbnails: Vec<String> = json_column(&row, "thumbnails")?;
        Ok(Some(BookingDetail {
            order: row_to_order(&row)?,
            service_type: row.try_get("service_type").map_err(db_error)?,
            service_form: form_column(&row, "forms")?,
            temple: TempleSummary {
                slug: row.try_get("slug").map_err(db_error)?,
                name: row.try_get("name").map_err(db_error)?,
                address: row.try_get("address").map_err(db_error)?,
                phone: row.try_get("phone").map_err(db_error)?,
                thumbnail: thumbnails.into_iter().next(),
            },
        }))
    }
}

impl OrderRepository for PostgresBookingStore {
    fn insert(&self, order: NewOrder, at: DateTime<Utc>) -> StoreFuture<'_, Order> {
        Box::pin(self.insert_order(order, at))
    }

    fn load(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(self.load_order(id))
    }

    fn record_transition(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, Order> {
        Box::pin(self.transition_order(id, from, to, at))
    }

    fn list_for_user<'a>(&'a self, user: &'a UserId) -> StoreFuture<'a, Vec<BookingSummary>> {
        Box::pin(self.bookings_of(user))
    }

    fn find_for_user<'a>(&'a self, user: &'a UserId, id: OrderId) -> StoreFuture<'a, Option<BookingDetail>> {
        Box::pin(self.booking_of(user, id))
    }
}
