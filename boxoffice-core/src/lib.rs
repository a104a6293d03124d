pub mod booking;
pub mod clock;
pub mod dto;
pub mod expiry;
pub mod repository;

use std::fmt;
use uuid::Uuid;

pub use booking::{Booking, BookingStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use expiry::{Disposition, ExpiryHandler, ExpiryScheduler};
pub use repository::{BookingRepository, EventRepository};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Kind of row an operation failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Event,
    Place,
    Booking,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Event => write!(f, "event"),
            Entity::Place => write!(f, "place"),
            Entity::Booking => write!(f, "booking"),
        }
    }
}

/// Bad input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Catalog(#[from] boxoffice_catalog::CatalogError),

    #[error("event id is required")]
    MissingEventId,

    #[error("place id is required")]
    MissingPlaceId,

    #[error("booking id is required")]
    MissingBookingId,

    /// A storage constraint rejected the write (foreign key, check, bad date, duplicate key).
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// The request is valid but current state forbids it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("event already exists: {0}")]
    EventAlreadyExists(Uuid),

    #[error("place already booked: {0}")]
    PlaceAlreadyBooked(Uuid),

    #[error("booking already paid: {0}")]
    BookingAlreadyPaid(Uuid),

    #[error("booking was cancelled: {0}")]
    BookingCancelled(Uuid),

    #[error("booking expired: {0}")]
    BookingExpired(Uuid),

    #[error("invalid booking status for {id}: {status}")]
    InvalidBookingStatus { id: Uuid, status: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0} not found: {1}")]
    NotFound(Entity, Uuid),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("persistence failure ({context}): {source}")]
    Persistence {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("transport failure ({context}): {source}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },
}

impl CoreError {
    pub fn persistence(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn transport(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Storage and broker failures may succeed on retry; everything else will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Persistence { .. } | CoreError::Transport { .. })
    }
}

impl From<boxoffice_catalog::CatalogError> for CoreError {
    fn from(err: boxoffice_catalog::CatalogError) -> Self {
        CoreError::Validation(ValidationError::Catalog(err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_catalog::CatalogError;

    #[test]
    fn test_retryable_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        assert!(CoreError::persistence("begin transaction", io).is_retryable());
        assert!(CoreError::transport("publish", "broker unreachable").is_retryable());

        assert!(!CoreError::from(CatalogError::InvalidTtl(4)).is_retryable());
        assert!(!CoreError::NotFound(Entity::Booking, Uuid::nil()).is_retryable());
        assert!(!CoreError::from(ConflictError::PlaceAlreadyBooked(Uuid::nil())).is_retryable());
    }

    #[test]
    fn test_messages() {
        let id = Uuid::nil();
        assert_eq!(
            CoreError::NotFound(Entity::Place, id).to_string(),
            format!("place not found: {}", id)
        );
        assert_eq!(
            CoreError::from(CatalogError::EventDateInPast).to_string(),
            "validation failed: event date is in the past"
        );
    }
}
