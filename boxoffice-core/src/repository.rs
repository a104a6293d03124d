use async_trait::async_trait;
use boxoffice_catalog::{Event, EventSummary};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::Booking;
use crate::CoreResult;

/// Catalog side of the persistence gateway
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert the event and all of its places atomically.
    async fn create_event(&self, event: &Event) -> CoreResult<()>;

    /// Event with its places ordered by row, then seat.
    async fn get_event(&self, id: Uuid) -> CoreResult<Event>;

    /// Events dated after `now`, soonest first, with seat counts.
    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> CoreResult<Vec<EventSummary>>;

    async fn delete_event(&self, id: Uuid) -> CoreResult<()>;
}

/// Booking side of the persistence gateway.
///
/// Every mutation runs in a single transaction that locks the row it decides on,
/// so a place/booking pair is always committed together.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Lock the place, reject if already booked, insert the PENDING booking and
    /// mark the place booked.
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Booking>;

    /// PENDING → PAID. Any other current status is a conflict.
    async fn pay_booking(&self, id: Uuid, paid_at: DateTime<Utc>) -> CoreResult<Booking>;

    /// PENDING → EXPIRED and free the place. Returns `false` without touching
    /// anything when the booking is no longer PENDING.
    async fn cancel_booking(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> CoreResult<bool>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Booking>;

    /// PENDING bookings whose `expiry_at` is before `now`, oldest first.
    async fn find_overdue_bookings(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>>;
}
