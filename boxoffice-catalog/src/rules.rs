use chrono::{DateTime, Utc};

/// Shortest hold a booking may have before it expires.
pub const MIN_BOOKING_TTL_MINUTES: i32 = 5;

/// Longest hold (one week).
pub const MAX_BOOKING_TTL_MINUTES: i32 = 10080;

/// Largest seat map a single event may have.
pub const MAX_PLACES_PER_EVENT: i64 = 100_000;

/// Catalog rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("seat number must be greater than zero")]
    NonPositiveSeats,

    #[error("row number must be greater than zero")]
    NonPositiveRows,

    #[error(
        "invalid booking TTL: {0} minutes (allowed {min}..={max})",
        min = MIN_BOOKING_TTL_MINUTES,
        max = MAX_BOOKING_TTL_MINUTES
    )]
    InvalidTtl(i32),

    #[error("seat map too large: {0} places (max {max})", max = MAX_PLACES_PER_EVENT)]
    TooManyPlaces(i64),

    #[error("event date is in the past")]
    EventDateInPast,
}

pub fn validate_ttl(ttl_minutes: i32) -> Result<(), CatalogError> {
    if (MIN_BOOKING_TTL_MINUTES..=MAX_BOOKING_TTL_MINUTES).contains(&ttl_minutes) {
        Ok(())
    } else {
        Err(CatalogError::InvalidTtl(ttl_minutes))
    }
}

/// An event scheduled exactly at `now` is still accepted.
pub fn validate_event_date(
    event_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), CatalogError> {
    if event_date < now {
        return Err(CatalogError::EventDateInPast);
    }
    Ok(())
}

pub fn validate_dimensions(rows: i32, seats_per_row: i32) -> Result<(), CatalogError> {
    if seats_per_row <= 0 {
        return Err(CatalogError::NonPositiveSeats);
    }
    if rows <= 0 {
        return Err(CatalogError::NonPositiveRows);
    }
    let places = i64::from(rows) * i64::from(seats_per_row);
    if places > MAX_PLACES_PER_EVENT {
        return Err(CatalogError::TooManyPlaces(places));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_ttl_bounds() {
        assert_eq!(validate_ttl(4), Err(CatalogError::InvalidTtl(4)));
        assert!(validate_ttl(5).is_ok());
        assert!(validate_ttl(30).is_ok());
        assert_eq!(validate_ttl(0), Err(CatalogError::InvalidTtl(0)));
        assert!(validate_ttl(10080).is_ok());
        assert_eq!(validate_ttl(10081), Err(CatalogError::InvalidTtl(10081)));
        assert!(validate_ttl(-5).is_err());
    }

    #[test]
    fn test_event_date() {
        let now = Utc::now();
        assert!(validate_event_date(now + Duration::days(1), now).is_ok());
        assert!(validate_event_date(now, now).is_ok());
        assert_eq!(
            validate_event_date(now - Duration::seconds(1), now),
            Err(CatalogError::EventDateInPast)
        );
    }

    #[test]
    fn test_dimensions() {
        assert!(validate_dimensions(1, 1).is_ok());
        assert_eq!(validate_dimensions(1, 0), Err(CatalogError::NonPositiveSeats));
        assert_eq!(validate_dimensions(0, 10), Err(CatalogError::NonPositiveRows));
        assert_eq!(validate_dimensions(-1, -1), Err(CatalogError::NonPositiveSeats));
        assert!(validate_dimensions(100, 1000).is_ok());
        assert_eq!(validate_dimensions(100, 1001), Err(CatalogError::TooManyPlaces(100_100)));
        assert_eq!(
            validate_dimensions(i32::MAX, i32::MAX),
            Err(CatalogError::TooManyPlaces(i64::from(i32::MAX) * i64::from(i32::MAX)))
        );
    }
}
