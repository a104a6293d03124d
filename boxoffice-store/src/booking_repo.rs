use async_trait::async_trait;
use boxoffice_core::repository::BookingRepository;
use boxoffice_core::{Booking, BookingStatus, ConflictError, CoreError, CoreResult, Entity};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::pg_error::map_write_error;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> CoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| CoreError::persistence("begin transaction", e))
    }
}

async fn rollback(tx: Transaction<'static, Postgres>) -> CoreResult<()> {
    tx.rollback()
        .await
        .map_err(|e| CoreError::persistence("rollback", e))
}

/// Why a booking in `status` cannot be paid, if it cannot.
fn payment_conflict(id: Uuid, status: &str) -> Option<ConflictError> {
    match status.parse::<BookingStatus>() {
        Ok(BookingStatus::Pending) => None,
        Ok(BookingStatus::Paid) => Some(ConflictError::BookingAlreadyPaid(id)),
        Ok(BookingStatus::Cancelled) => Some(ConflictError::BookingCancelled(id)),
        Ok(BookingStatus::Expired) => Some(ConflictError::BookingExpired(id)),
        Err(status) => Some(ConflictError::InvalidBookingStatus { id, status }),
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    place_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    expiry_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|s| {
                CoreError::persistence("decode booking", format!("unknown status {}", s))
            })?;

        Ok(Booking {
            id: row.id,
            event_id: row.event_id,
            place_id: row.place_id,
            status,
            created_at: row.created_at,
            expiry_at: row.expiry_at,
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str =
    "id, event_id, place_id, status, created_at, expiry_at, paid_at, cancelled_at, updated_at";

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Booking> {
        let mut tx = self.begin().await?;

        // Row lock serializes every attempt on this place until commit/rollback
        let is_booked: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT is_booked
            FROM places
            WHERE id = $1 AND event_id = $2
            FOR UPDATE
            "#,
        )
        .bind(booking.place_id)
        .bind(booking.event_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CoreError::persistence("lock place", e))?;

        match is_booked {
            None => {
                rollback(tx).await?;
                return Err(CoreError::NotFound(Entity::Place, booking.place_id));
            }
            Some(true) => {
                rollback(tx).await?;
                return Err(ConflictError::PlaceAlreadyBooked(booking.place_id).into());
            }
            Some(false) => {}
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (id, event_id, place_id, status, created_at, expiry_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.place_id)
        .bind(BookingStatus::Pending.as_str())
        .bind(booking.created_at)
        .bind(booking.expiry_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "insert booking"))?;

        sqlx::query("UPDATE places SET is_booked = TRUE, updated_at = $2 WHERE id = $1")
            .bind(booking.place_id)
            .bind(booking.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::persistence("mark place booked", e))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::persistence("commit booking", e))?;

        Ok(Booking {
            status: BookingStatus::Pending,
            paid_at: None,
            cancelled_at: None,
            ..booking.clone()
        })
    }

    async fn pay_booking(&self, id: Uuid, paid_at: DateTime<Utc>) -> CoreResult<Booking> {
        let mut tx = self.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CoreError::persistence("lock booking", e))?;

        let Some(status) = status else {
            rollback(tx).await?;
            return Err(CoreError::NotFound(Entity::Booking, id));
        };
        if let Some(conflict) = payment_conflict(id, &status) {
            rollback(tx).await?;
            return Err(conflict.into());
        }

        let updated: BookingRow = sqlx::query_as(&format!(
            "UPDATE bookings SET status = $2, paid_at = $3, updated_at = $3 \
             WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(BookingStatus::Paid.as_str())
        .bind(paid_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CoreError::persistence("mark booking paid", e))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::persistence("commit payment", e))?;

        Booking::try_from(updated)
    }

    async fn cancel_booking(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> CoreResult<bool> {
        let mut tx = self.begin().await?;

        let row: Option<(String, Uuid)> = sqlx::query_as(
            "SELECT status, place_id FROM bookings WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CoreError::persistence("lock booking", e))?;

        let Some((status, place_id)) = row else {
            rollback(tx).await?;
            return Err(CoreError::NotFound(Entity::Booking, id));
        };

        if status != BookingStatus::Pending.as_str() {
            debug!(booking_id = %id, status = %status, "Cancel skipped, booking no longer pending");
            rollback(tx).await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, cancelled_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(BookingStatus::Expired.as_str())
        .bind(cancelled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::persistence("expire booking", e))?;

        sqlx::query("UPDATE places SET is_booked = FALSE, updated_at = $2 WHERE id = $1")
            .bind(place_id)
            .bind(cancelled_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| CoreError::persistence("free place", e))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::persistence("commit cancellation", e))?;

        Ok(true)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Booking> {
        let row: BookingRow = sqlx::query_as(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("select booking", e))?
        .ok_or(CoreError::NotFound(Entity::Booking, id))?;

        Booking::try_from(row)
    }

    async fn find_overdue_bookings(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        sqlx::query_scalar(
            r#"
            SELECT id
            FROM bookings
            WHERE status = 'PENDING' AND expiry_at < $1
            ORDER BY expiry_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("find overdue bookings", e))
    }
}
