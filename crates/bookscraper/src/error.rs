//! Error types for the scraping pipeline
//!
//! Each stage has its own error so callers can apply the right recovery:
//! a [`ValidationError`] drops one record, a [`HeaderPoolError`] turns header
//! rotation into a no-op, and a [`PersistenceError`] is either reported per
//! record or, when [`PersistenceError::is_fatal`], ends the sink.

use crate::record::{Field, Rule};
use thiserror::Error;

/// Result type alias for pipeline-level operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// A raw record could not be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: Field },

    #[error("unexpected field '{field}'")]
    UnexpectedField { field: String },

    #[error("field '{field}' failed rule '{rule}' on value {value:?}: {reason}")]
    InvalidValue {
        field: Field,
        value: String,
        rule: Rule,
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: Field, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.to_string(),
            rule: field.rule(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField { field } | Self::InvalidValue { field, .. } => field.as_str(),
            Self::UnexpectedField { field } => field,
        }
    }

    /// Raw value that failed, if one was present
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Rule that rejected the value, if a rule ran
    pub fn rule(&self) -> Option<Rule> {
        match self {
            Self::InvalidValue { rule, .. } => Some(*rule),
            _ => None,
        }
    }
}

/// The browser-header provider could not supply templates.
#[derive(Error, Debug)]
pub enum HeaderPoolError {
    #[error("Header provider error: {0}")]
    Provider(String),

    #[error("Header provider request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Header provider at {endpoint} timed out after {secs}s")]
    Timeout { endpoint: String, secs: u64 },

    #[error("Header provider returned no usable templates")]
    NoUsableTemplates,

    #[error("Header pool is empty")]
    EmptyPool,
}

impl HeaderPoolError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }
}

/// A typed record could not be stored.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Failed to write record: {0}")]
    Write(#[source] sqlx::Error),

    #[error("Database {operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Invalid sink configuration: {0}")]
    Config(String),

    #[error("Sink connection is unusable after an earlier fatal error")]
    Unusable,

    #[error("Sink is closed")]
    Closed,
}

impl PersistenceError {
    /// Sort a driver error into connection-level or per-row failure.
    pub fn classify(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(err),
            other => Self::Write(other),
        }
    }

    /// Whether the sink must stop accepting writes.
    ///
    /// Constraint violations and bad values only lose the current record;
    /// anything that leaves the connection in an unknown state is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Write(_))
    }
}

/// Umbrella error for callers driving the whole pipeline
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    HeaderPool(#[from] HeaderPoolError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Common(#[from] bookscraper_common::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_context() {
        let err = ValidationError::invalid(Field::Stars, "Star rating Six", "unknown rating word");
        assert_eq!(err.field(), "stars");
        assert_eq!(err.value(), Some("Star rating Six"));
        assert_eq!(err.rule(), Some(Rule::Stars));

        let message = err.to_string();
        assert!(message.contains("stars"));
        assert!(message.contains("Star rating Six"));
        assert!(message.contains("'stars'"));
    }

    #[test]
    fn test_missing_field_has_no_value() {
        let err = ValidationError::MissingField { field: Field::Upc };
        assert_eq!(err.field(), "upc");
        assert_eq!(err.value(), None);
        assert_eq!(err.rule(), None);
    }

    #[test]
    fn test_classify_connection_errors_as_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = PersistenceError::classify(sqlx::Error::Io(io));
        assert!(matches!(err, PersistenceError::Connection(_)));
        assert!(err.is_fatal());

        let err = PersistenceError::classify(sqlx::Error::Protocol("bad packet".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_row_errors_as_recoverable() {
        let err = PersistenceError::classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, PersistenceError::Write(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_timeouts_are_fatal() {
        let err = PersistenceError::Timeout {
            operation: "write",
            secs: 10,
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "Database write timed out after 10s");
    }

    #[test]
    fn test_scrape_error_wraps_stage_errors() {
        fn drop_record() -> Result<()> {
            let normalized: std::result::Result<(), ValidationError> =
                Err(ValidationError::MissingField { field: Field::Title });
            normalized?;
            Ok(())
        }

        let err = drop_record().unwrap_err();
        assert!(matches!(err, ScrapeError::Validation(_)));
        assert_eq!(err.to_string(), "missing required field 'title'");

        let err: ScrapeError = HeaderPoolError::EmptyPool.into();
        assert_eq!(err.to_string(), "Header pool is empty");
    }
}
