use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking lifecycle: PENDING → {PAID | CANCELLED | EXPIRED}
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Paid => "PAID",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    /// Whether a booking in this status keeps its place occupied.
    pub fn holds_place(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Paid)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "PAID" => Ok(BookingStatus::Paid),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            other => Err(other.to_string()),
        }
    }
}

/// A reservation of one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub place_id: Uuid,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    /// `created_at` plus the event's booking TTL.
    pub expiry_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// New PENDING booking expiring `ttl` after `now`.
    pub fn pending(event_id: Uuid, place_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            place_id,
            status: BookingStatus::Pending,
            created_at: now,
            expiry_at: now + ttl,
            paid_at: None,
            cancelled_at: None,
            updated_at: now,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.expiry_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Paid,
            BookingStatus::Cancelled,
            BookingStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
        }
        assert!("pending".parse::<BookingStatus>().is_err());
        assert!("REFUNDED".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_uppercase() {
        let json = serde_json::to_string(&BookingStatus::Expired).unwrap();
        assert_eq!(json, "\"EXPIRED\"");
    }

    #[test]
    fn test_pending_booking_expiry() {
        let now = Utc::now();
        let booking = Booking::pending(Uuid::new_v4(), Uuid::new_v4(), now, Duration::minutes(5));

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.expiry_at, now + Duration::minutes(5));
        assert!(booking.paid_at.is_none());
        assert!(!booking.is_overdue(now + Duration::minutes(5)));
        assert!(booking.is_overdue(now + Duration::minutes(5) + Duration::seconds(1)));
    }

    #[test]
    fn test_holds_place() {
        assert!(BookingStatus::Pending.holds_place());
        assert!(BookingStatus::Paid.holds_place());
        assert!(!BookingStatus::Cancelled.holds_place());
        assert!(!BookingStatus::Expired.holds_place());
    }
}
