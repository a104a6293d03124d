use async_trait::async_trait;
use boxoffice_catalog::{Event, EventSummary};
use boxoffice_core::repository::{BookingRepository, EventRepository};
use boxoffice_core::{Booking, BookingStatus, ConflictError, CoreError, CoreResult, Entity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
}

/// Single-process gateway. The one mutex plays the part of the row locks:
/// every operation sees and leaves a consistent place/booking pairing.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with a retryable persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self, context: &str) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::persistence(context, "store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn create_event(&self, event: &Event) -> CoreResult<()> {
        self.check_available("insert event")?;
        let mut state = self.state.lock().await;

        if state.events.contains_key(&event.id) {
            return Err(ConflictError::EventAlreadyExists(event.id).into());
        }

        let mut event = event.clone();
        event.places.sort_by_key(|p| (p.row, p.seat));
        state.events.insert(event.id, event);
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Event> {
        self.check_available("select event")?;
        let state = self.state.lock().await;

        state
            .events
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound(Entity::Event, id))
    }

    async fn list_upcoming_events(&self, now: DateTime<Utc>) -> CoreResult<Vec<EventSummary>> {
        self.check_available("list events")?;
        let state = self.state.lock().await;

        let mut upcoming: Vec<&Event> =
            state.events.values().filter(|e| e.event_date > now).collect();
        upcoming.sort_by_key(|e| e.event_date);
        Ok(upcoming.into_iter().map(EventSummary::from_event).collect())
    }

    async fn delete_event(&self, id: Uuid) -> CoreResult<()> {
        self.check_available("delete event")?;
        let mut state = self.state.lock().await;

        if state.events.remove(&id).is_none() {
            return Err(CoreError::NotFound(Entity::Event, id));
        }
        state.bookings.retain(|_, b| b.event_id != id);
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Booking> {
        self.check_available("insert booking")?;
        let mut state = self.state.lock().await;

        let place = state
            .events
            .get_mut(&booking.event_id)
            .and_then(|e| e.places.iter_mut().find(|p| p.id == booking.place_id))
            .ok_or(CoreError::NotFound(Entity::Place, booking.place_id))?;

        if place.is_booked {
            return Err(ConflictError::PlaceAlreadyBooked(booking.place_id).into());
        }
        place.is_booked = true;
        place.updated_at = booking.created_at;

        let stored = Booking {
            status: BookingStatus::Pending,
            paid_at: None,
            cancelled_at: None,
            ..booking.clone()
        };
        state.bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn pay_booking(&self, id: Uuid, paid_at: DateTime<Utc>) -> CoreResult<Booking> {
        self.check_available("pay booking")?;
        let mut state = self.state.lock().await;

        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(CoreError::NotFound(Entity::Booking, id))?;

        match booking.status {
            BookingStatus::Pending => {}
            BookingStatus::Paid => return Err(ConflictError::BookingAlreadyPaid(id).into()),
            BookingStatus::Cancelled => return Err(ConflictError::BookingCancelled(id).into()),
            BookingStatus::Expired => return Err(ConflictError::BookingExpired(id).into()),
        }

        booking.status = BookingStatus::Paid;
        booking.paid_at = Some(paid_at);
        booking.updated_at = paid_at;
        Ok(booking.clone())
    }

    async fn cancel_booking(&self, id: Uuid, cancelled_at: DateTime<Utc>) -> CoreResult<bool> {
        self.check_available("cancel booking")?;
        let mut state = self.state.lock().await;

        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(CoreError::NotFound(Entity::Booking, id))?;

        if booking.status != BookingStatus::Pending {
            return Ok(false);
        }

        booking.status = BookingStatus::Expired;
        booking.cancelled_at = Some(cancelled_at);
        booking.updated_at = cancelled_at;
        let (event_id, place_id) = (booking.event_id, booking.place_id);
        let still_held = booking.status.holds_place();

        if let Some(place) = state
            .events
            .get_mut(&event_id)
            .and_then(|e| e.places.iter_mut().find(|p| p.id == place_id))
        {
            place.is_booked = still_held;
            place.updated_at = cancelled_at;
        }
        Ok(true)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Booking> {
        self.check_available("select booking")?;
        let state = self.state.lock().await;

        state
            .bookings
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound(Entity::Booking, id))
    }

    async fn find_overdue_bookings(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        self.check_available("find overdue bookings")?;
        let state = self.state.lock().await;

        let mut overdue: Vec<&Booking> =
            state.bookings.values().filter(|b| b.is_overdue(now)).collect();
        overdue.sort_by_key(|b| b.expiry_at);
        Ok(overdue
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|b| b.id)
            .collect())
    }
}
