use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Payload published to the delayed exchange when a booking is created.
///
/// Carries everything the expiry worker needs to act without re-reading the
/// event. It is never persisted.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
pub struct ExpiryNotification {
    pub booking_id: Uuid,
    pub event_id: Uuid,
    pub place_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ttl_minutes: i32,
}

impl ExpiryNotification {
    pub fn new(
        booking_id: Uuid,
        event_id: Uuid,
        place_id: Uuid,
        created_at: DateTime<Utc>,
        ttl_minutes: i32,
    ) -> Self {
        Self {
            booking_id,
            event_id,
            place_id,
            created_at,
            ttl_minutes,
        }
    }

    /// How long the message must age before it is delivered.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.ttl_minutes).unwrap_or(0) * 60)
    }

    /// Per-message expiration in milliseconds, as the broker expects it.
    pub fn expiration_ms(&self) -> u128 {
        self.delay().as_millis()
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ttl_minutes: i32) -> ExpiryNotification {
        let (booking_id, event_id, place_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        ExpiryNotification::new(booking_id, event_id, place_id, Utc::now(), ttl_minutes)
    }

    #[test]
    fn test_wire_field_names() {
        let notification = sample(15);
        let value = serde_json::to_value(&notification).unwrap();

        for field in ["booking_id", "event_id", "place_id", "created_at", "ttl_minutes"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["ttl_minutes"], 15);
    }

    #[test]
    fn test_expiration_matches_ttl() {
        let notification = sample(5);
        assert_eq!(notification.delay(), Duration::from_secs(300));
        assert_eq!(notification.expiration_ms(), 300_000);
    }

    #[test]
    fn test_negative_ttl_is_zero_delay() {
        let notification = sample(-1);
        assert_eq!(notification.delay(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_malformed_payload() {
        assert!(ExpiryNotification::from_json(b"{\"booking_id\": 42}").is_err());
        assert!(ExpiryNotification::from_json(b"not json").is_err());
    }
}
