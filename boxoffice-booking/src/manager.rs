use boxoffice_catalog::rules::{validate_event_date, validate_ttl};
use boxoffice_catalog::{Event, SeatLayout};
use boxoffice_core::dto::{
    BookingResponse, CreateBookingRequest, CreateEventRequest, EventCreatedResponse,
    EventDetailsResponse, EventListItemResponse,
};
use boxoffice_core::{
    Booking, BookingRepository, Clock, CoreResult, EventRepository, ExpiryScheduler,
    ValidationError,
};
use boxoffice_shared::ExpiryNotification;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Validates requests and composes the gateway and the expiry channel.
///
/// Holds no state of its own, so any number of instances may run side by side;
/// all serialization happens in the gateway.
pub struct ReservationManager {
    events: Arc<dyn EventRepository>,
    bookings: Arc<dyn BookingRepository>,
    scheduler: Arc<dyn ExpiryScheduler>,
    clock: Arc<dyn Clock>,
}

impl ReservationManager {
    pub fn new(
        events: Arc<dyn EventRepository>,
        bookings: Arc<dyn BookingRepository>,
        scheduler: Arc<dyn ExpiryScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            events,
            bookings,
            scheduler,
            clock,
        }
    }

    pub async fn create_event(
        &self,
        request: CreateEventRequest,
    ) -> CoreResult<EventCreatedResponse> {
        let now = self.clock.now();
        let ttl_minutes = request.booking_ttl_minutes;

        let layout = SeatLayout::new(request.rows, request.seats)?;
        validate_ttl(ttl_minutes)?;
        validate_event_date(request.event_date, now)?;

        let id = Uuid::new_v4();
        let event = Event {
            id,
            name: request.name,
            description: request.description,
            event_date: request.event_date,
            booking_ttl_minutes: ttl_minutes,
            places: layout.places(id, now),
            created_at: now,
            updated_at: now,
        };

        self.events.create_event(&event).await?;

        info!(
            event_id = %id,
            places = event.places.len(),
            ttl_minutes,
            "Event created"
        );
        Ok(EventCreatedResponse {
            event_id: id,
            created_at: now,
        })
    }

    pub async fn get_event(&self, id: Uuid) -> CoreResult<EventDetailsResponse> {
        require(id, ValidationError::MissingEventId)?;
        let event = self.events.get_event(id).await?;
        Ok(EventDetailsResponse::from(&event))
    }

    /// Events still ahead of now, soonest first.
    pub async fn list_events(&self) -> CoreResult<Vec<EventListItemResponse>> {
        let events = self.events.list_upcoming_events(self.clock.now()).await?;
        Ok(events.into_iter().map(EventListItemResponse::from).collect())
    }

    pub async fn delete_event(&self, id: Uuid) -> CoreResult<()> {
        require(id, ValidationError::MissingEventId)?;
        self.events.delete_event(id).await?;
        info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// Hold a place and schedule its automatic release.
    ///
    /// The booking is committed before the expiry notification is published. A failed
    /// publish is logged and does not undo the booking; the reconciliation sweep
    /// catches bookings whose notification never arrives.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> CoreResult<BookingResponse> {
        require(request.event_id, ValidationError::MissingEventId)?;
        require(request.place_id, ValidationError::MissingPlaceId)?;

        let event = self.events.get_event(request.event_id).await?;
        let now = self.clock.now();

        info!(
            event_id = %request.event_id,
            place_id = %request.place_id,
            ttl_minutes = event.booking_ttl_minutes,
            "Creating booking"
        );

        let pending = Booking::pending(
            request.event_id,
            request.place_id,
            now,
            event.booking_ttl(),
        );
        let booking = self.bookings.create_booking(&pending).await?;

        let notification = ExpiryNotification::new(
            booking.id,
            booking.event_id,
            booking.place_id,
            now,
            event.booking_ttl_minutes,
        );
        if let Err(e) = self.scheduler.schedule(&notification).await {
            warn!(
                booking_id = %booking.id,
                error = %e,
                "Failed to schedule booking expiry; booking stays pending until swept"
            );
        }

        info!(booking_id = %booking.id, expiry_at = %booking.expiry_at, "Booking created");
        Ok(BookingResponse::new(&booking, "Booking created successfully"))
    }

    pub async fn pay_booking(&self, id: Uuid) -> CoreResult<BookingResponse> {
        require(id, ValidationError::MissingBookingId)?;
        let booking = self.bookings.pay_booking(id, self.clock.now()).await?;
        info!(booking_id = %id, "Booking paid");
        Ok(BookingResponse::new(&booking, "Booking paid successfully"))
    }

    /// Release a PENDING booking and its place. `Ok(false)` means there was nothing to do.
    pub async fn cancel_booking(&self, id: Uuid) -> CoreResult<bool> {
        require(id, ValidationError::MissingBookingId)?;
        self.bookings.cancel_booking(id, self.clock.now()).await
    }

    pub async fn get_booking(&self, id: Uuid) -> CoreResult<BookingResponse> {
        require(id, ValidationError::MissingBookingId)?;
        let booking = self.bookings.get_booking(id).await?;
        Ok(BookingResponse::new(&booking, ""))
    }

    /// Ids of PENDING bookings already past their expiry, oldest first.
    pub async fn overdue_bookings(&self, limit: i64) -> CoreResult<Vec<Uuid>> {
        self.bookings.find_overdue_bookings(self.clock.now(), limit).await
    }
}

fn require(id: Uuid, missing: ValidationError) -> CoreResult<()> {
    if id.is_nil() {
        return Err(missing.into());
    }
    Ok(())
}
