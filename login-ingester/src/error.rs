use thiserror::Error;

/// Errors raised while turning a raw queue message body into a `LoginEvent`.
/// All of these are permanent for the message in question: reprocessing the
/// same bytes can never succeed, so the driver dead-letters instead of
/// leaving the message for redelivery.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message body is a JSON array with no elements")]
    EmptyArray,
    #[error("message body is a JSON array with {0} elements, expected exactly one")]
    AmbiguousArray(usize),
    #[error("message body is not a JSON object")]
    NotAnObject,
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("field '{0}' must be a string")]
    WrongType(&'static str),
    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),
}

/// Errors raised while inserting a masked record, split by whether the queue's
/// redelivery mechanism should get another shot at the message.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("retryable database error: {0}")]
    Retryable(#[source] sqlx::Error),
    #[error("non-retryable database error: {0}")]
    NonRetryable(#[source] sqlx::Error),
}

impl WriteError {
    /// Connectivity-shaped failures are left to the visibility timeout;
    /// anything the database actively rejected (constraint violations, type
    /// or schema mismatches) will fail identically on every redelivery.
    pub fn classify(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => WriteError::Retryable(error),
            _ => WriteError::NonRetryable(error),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Retryable(_))
    }
}

/// Errors from the queue source itself. Both kinds are transient: a failed
/// receive is retried on the next poll, and a failed delete is safe because
/// the insert path is idempotent.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue receive failed: {0}")]
    Receive(#[source] anyhow::Error),
    #[error("queue delete failed: {0}")]
    Delete(#[source] anyhow::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pool_and_io_errors_are_retryable() {
        assert!(WriteError::classify(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(WriteError::classify(sqlx::Error::PoolClosed).is_retryable());
        assert!(WriteError::classify(sqlx::Error::WorkerCrashed).is_retryable());
        assert!(WriteError::classify(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused"
        )))
        .is_retryable());
    }

    #[test]
    fn logic_errors_are_not_retryable() {
        assert!(!WriteError::classify(sqlx::Error::RowNotFound).is_retryable());
        assert!(!WriteError::classify(sqlx::Error::ColumnNotFound(
            "masked_ip".to_string()
        ))
        .is_retryable());
    }
}
