use boxoffice_catalog::{Event, EventSummary, Place};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    #[serde(rename = "event_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub rows: i32,
    pub seats: i32,
    /// Absent decodes as 0 and fails TTL validation.
    #[serde(default)]
    pub booking_ttl_minutes: i32,
}

/// A nil UUID counts as a missing id.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub event_id: Uuid,
    #[serde(default)]
    pub place_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventCreatedResponse {
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceResponse {
    pub id: Uuid,
    pub row: i32,
    pub seat: i32,
    pub is_booked: bool,
}

impl From<&Place> for PlaceResponse {
    fn from(place: &Place) -> Self {
        Self {
            id: place.id,
            row: place.row,
            seat: place.seat,
            is_booked: place.is_booked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetailsResponse {
    #[serde(rename = "event_id")]
    pub id: Uuid,
    #[serde(rename = "event_name")]
    pub name: String,
    #[serde(rename = "event_description")]
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub booking_ttl_minutes: i32,
    pub total_places: i64,
    pub available_places: i64,
    pub booked_places: i64,
    pub places: Vec<PlaceResponse>,
}

impl From<&Event> for EventDetailsResponse {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            description: event.description.clone(),
            event_date: event.event_date,
            created_at: event.created_at,
            booking_ttl_minutes: event.booking_ttl_minutes,
            total_places: event.total_places() as i64,
            available_places: event.available_places() as i64,
            booked_places: event.booked_places() as i64,
            places: event.places.iter().map(PlaceResponse::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventListItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub booking_ttl_minutes: i32,
    pub total_places: i64,
    pub available_places: i64,
    pub booked_places: i64,
    pub has_available_places: bool,
}

impl From<EventSummary> for EventListItemResponse {
    fn from(summary: EventSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            description: summary.description,
            event_date: summary.event_date,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            booking_ttl_minutes: summary.booking_ttl_minutes,
            total_places: summary.total_places,
            available_places: summary.available_places,
            booked_places: summary.booked_places,
            has_available_places: summary.available_places > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub place_id: Uuid,
    pub status: BookingStatus,
    pub expiry_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl BookingResponse {
    pub fn new(booking: &Booking, message: impl Into<String>) -> Self {
        Self {
            booking_id: booking.id,
            event_id: booking.event_id,
            place_id: booking.place_id,
            status: booking.status,
            expiry_at: booking.expiry_at,
            paid_at: booking.paid_at,
            message: message.into(),
        }
    }
}
