use boxoffice_core::{ConflictError, CoreError, ValidationError};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const INVALID_DATETIME_FORMAT: &str = "22007";
const STRING_DATA_RIGHT_TRUNCATION: &str = "22001";

/// Classify a failed statement. Constraint violations are the caller's fault;
/// everything else is a retryable persistence failure.
pub(crate) fn map_write_error(err: sqlx::Error, context: &str) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                let detail = format!("duplicate key: {}", constraint);
                return ValidationError::Constraint(detail).into();
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                let detail = format!("foreign key violation: {}", constraint);
                return ValidationError::Constraint(detail).into();
            }
            Some(CHECK_VIOLATION) => {
                let detail = format!("check constraint violation: {}", constraint);
                return ValidationError::Constraint(detail).into();
            }
            Some(INVALID_DATETIME_FORMAT) => {
                return ValidationError::Constraint("invalid date format".into()).into();
            }
            Some(STRING_DATA_RIGHT_TRUNCATION) => {
                let detail = format!("value too long: {}", db_err.message());
                return ValidationError::Constraint(detail).into();
            }
            _ => {}
        }
    }
    CoreError::persistence(context, err)
}

/// Same as [`map_write_error`], except a clash on the events primary key is a conflict.
pub(crate) fn map_event_insert_error(err: sqlx::Error, event_id: Uuid) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let duplicate = db_err.code().as_deref() == Some(UNIQUE_VIOLATION);
        if duplicate && db_err.constraint() == Some("events_pkey") {
            return ConflictError::EventAlreadyExists(event_id).into();
        }
    }
    map_write_error(err, "insert event")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_retryable() {
        let err = map_write_error(sqlx::Error::PoolTimedOut, "insert booking");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("insert booking"));

        let err = map_event_insert_error(sqlx::Error::RowNotFound, Uuid::nil());
        assert!(matches!(err, CoreError::Persistence { .. }));
    }
}
