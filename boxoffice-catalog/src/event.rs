use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable event with its full seat map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    /// Minutes a booking may stay PENDING. Fixed at creation.
    pub booking_ttl_minutes: i32,
    /// Ordered by row, then seat.
    pub places: Vec<Place>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn booking_ttl(&self) -> Duration {
        Duration::minutes(i64::from(self.booking_ttl_minutes))
    }

    pub fn total_places(&self) -> usize {
        self.places.len()
    }

    pub fn booked_places(&self) -> usize {
        self.places.iter().filter(|p| p.is_booked).count()
    }

    pub fn available_places(&self) -> usize {
        self.total_places() - self.booked_places()
    }
}

/// A single seat. Belongs to one event for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub id: Uuid,
    pub event_id: Uuid,
    pub row: i32,
    pub seat: i32,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing projection of an event with aggregated seat counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub booking_ttl_minutes: i32,
    pub total_places: i64,
    pub available_places: i64,
    pub booked_places: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventSummary {
    pub fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            description: event.description.clone(),
            event_date: event.event_date,
            booking_ttl_minutes: event.booking_ttl_minutes,
            total_places: event.total_places() as i64,
            available_places: event.available_places() as i64,
            booked_places: event.booked_places() as i64,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}
