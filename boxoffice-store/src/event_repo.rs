use async_trait::async_trait;
use boxoffice_catalog::{Event, EventSummary, Place};
use boxoffice_core::repository::EventRepository;
use boxoffice_core::{CoreError, CoreResult, Entity};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::pg_error::{map_event_insert_error, map_write_error};

pub struct StoreEventRepository {
    pool: PgPool,
}

impl StoreEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    description: String,
    event_date: DateTime<Utc>,
    booking_ttl_minutes: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PlaceRow {
    id: Uuid,
    event_id: Uuid,
    row_number: i32,
    seat_number: i32,
    is_booked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Place {
            id: row.id,
            event_id: row.event_id,
            row: row.row_number,
            seat: row.seat_number,
            is_booked: row.is_booked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EventSummaryRow {
    id: Uuid,
    name: String,
    description: String,
    event_date: DateTime<Utc>,
    booking_ttl_minutes: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    total_places: i64,
    available_places: i64,
    booked_places: i64,
}

#[async_trait]
impl EventRepository for StoreEventRepository {
    async fn create_event(&self, event: &Event) -> CoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::persistence("begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO events
                (id, name, description, event_date, booking_ttl_minutes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.event_date)
        .bind(event.booking_ttl_minutes)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_event_insert_error(e, event.id))?;

        if !event.places.is_empty() {
            let ids: Vec<Uuid> = event.places.iter().map(|p| p.id).collect();
            let rows: Vec<i32> = event.places.iter().map(|p| p.row).collect();
            let seats: Vec<i32> = event.places.iter().map(|p| p.seat).collect();

            // One round trip for the whole seat map
            sqlx::query(
                r#"
                INSERT INTO places
                    (id, event_id, row_number, seat_number, is_booked, created_at, updated_at)
                SELECT p.id, $1, p.row_number, p.seat_number, FALSE, $5, $5
                FROM UNNEST($2::uuid[], $3::int4[], $4::int4[]) AS p(id, row_number, seat_number)
                "#,
            )
            .bind(event.id)
            .bind(&ids)
            .bind(&rows)
            .bind(&seats)
            .bind(event.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "insert places"))?;
        }

        tx.commit()
            .await
            .map_err(|e| CoreError::persistence("commit event", e))?;

        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Event> {
        let row: EventRow = sqlx::query_as(
            r#"
            SELECT id, name, description, event_date, booking_ttl_minutes, created_at, updated_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("select event", e))?
        .ok_or(CoreError::NotFound(Entity::Event, id))?;

        let places: Vec<PlaceRow> = sqlx::query_as(
            r#"
            SELECT id, event_id, row_number, seat_number, is_booked, created_at, updated_at
            FROM places
            WHERE event_id = $1
            ORDER BY row_number, seat_number
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("select places", e))?;

        Ok(Event {
            id: row.id,
            name: row.name,
            description: row.description,
            event_date: row.event_date,
            booking_ttl_minutes: row.booking_ttl_minutes,
            places: places.into_iter().map(Place::from).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> CoreResult<Vec<EventSummary>> {
        let rows: Vec<EventSummaryRow> = sqlx::query_as(
            r#"
            SELECT
                e.id,
                e.name,
                e.description,
                e.event_date,
                e.booking_ttl_minutes,
                e.created_at,
                e.updated_at,
                COUNT(p.id) AS total_places,
                COUNT(p.id) FILTER (WHERE p.is_booked = FALSE) AS available_places,
                COUNT(p.id) FILTER (WHERE p.is_booked = TRUE) AS booked_places
            FROM events e
            LEFT JOIN places p ON p.event_id = e.id
            WHERE e.event_date > $1
            GROUP BY e.id
            ORDER BY e.event_date ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::persistence("list events", e))?;

        Ok(rows
            .into_iter()
            .map(|row| EventSummary {
                id: row.id,
                name: row.name,
                description: row.description,
                event_date: row.event_date,
                booking_ttl_minutes: row.booking_ttl_minutes,
                total_places: row.total_places,
                available_places: row.available_places,
                booked_places: row.booked_places,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn delete_event(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::persistence("delete event", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(Entity::Event, id));
        }
        Ok(())
    }
}
