//! Error types for mongorepo

use mongodb::error::TRANSIENT_TRANSACTION_ERROR;
use thiserror::Error;

/// Result type alias for mongorepo operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Unified error type for all mongorepo operations
#[derive(Error, Debug, Clone)]
pub enum RepoError {
    /// Error reported by the driver. Kept whole so its labels survive.
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// No document matched
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// The driver returned an id that is not an ObjectId
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// No client registered under the alias
    #[error("No MongoDB client registered under alias '{0}'")]
    ClientNotRegistered(String),

    /// Operation deadline elapsed
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Caller cancelled the operation
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Transient error that may succeed on retry
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Transaction failed after {attempts} attempts, last error: {source}")]
    TransactionFailed {
        attempts: u32,
        #[source]
        source: Box<RepoError>,
    },
}

impl RepoError {
    /// Returns true if the driver labelled this error `TransientTransactionError`.
    pub fn is_transient_transaction_error(&self) -> bool {
        match self {
            RepoError::MongoDB(err) => err.contains_label(TRANSIENT_TRANSACTION_ERROR),
            RepoError::Transient(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error is potentially retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Timeout(_)) || self.is_transient_transaction_error()
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }

    /// Returns true if the caller's deadline or cancellation ended the operation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RepoError::Timeout(_) | RepoError::Cancelled(_))
    }
}

impl From<bson::ser::Error> for RepoError {
    fn from(err: bson::ser::Error) -> Self {
        RepoError::Serialization(format!("BSON serialization error: {}", err))
    }
}

impl From<bson::de::Error> for RepoError {
    fn from(err: bson::de::Error) -> Self {
        RepoError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Configuration(format!("invalid JSON settings: {}", err))
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(err: serde_yaml::Error) -> Self {
        RepoError::Configuration(format!("invalid YAML settings: {}", err))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_connection() {
        let err = RepoError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "Connection error: timeout");
    }

    #[test]
    fn test_error_display_invalid_type() {
        let err = RepoError::InvalidType("inserted id is a string".to_string());
        assert_eq!(err.to_string(), "Invalid type: inserted id is a string");
    }

    #[test]
    fn test_error_display_client_not_registered() {
        let err = RepoError::ClientNotRegistered("analytics".to_string());
        assert_eq!(
            err.to_string(),
            "No MongoDB client registered under alias 'analytics'"
        );
    }

    #[test]
    fn test_error_display_transaction_failed() {
        let err = RepoError::TransactionFailed {
            attempts: 3,
            source: Box::new(RepoError::Transient("write conflict".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Transaction failed after 3 attempts, last error: Transient error: write conflict"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: RepoError = json_err.into();
        assert!(matches!(err, RepoError::Configuration(_)));
    }

    #[test]
    fn test_from_bson_de_error() {
        let de_err = bson::from_document::<String>(bson::doc! {}).unwrap_err();
        let err: RepoError = de_err.into();
        assert!(matches!(err, RepoError::Deserialization(_)));
    }

    #[test]
    fn test_is_transient_transaction_error() {
        assert!(RepoError::Transient("test".to_string()).is_transient_transaction_error());
        assert!(!RepoError::Timeout("test".to_string()).is_transient_transaction_error());
        assert!(!RepoError::Query("test".to_string()).is_transient_transaction_error());
    }

    #[test]
    fn test_driver_error_labels() {
        use mongodb::error::{ErrorKind, WriteConcernError, WriteFailure};

        let write_concern_error = |labels: Vec<&str>| -> RepoError {
            let wce: WriteConcernError = bson::from_document(bson::doc! {
                "code": 112,
                "codeName": "WriteConflict",
                "errmsg": "write conflict during commit",
                "errorLabels": labels,
            })
            .unwrap();
            mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteConcernError(wce))).into()
        };

        let labelled = write_concern_error(vec![TRANSIENT_TRANSACTION_ERROR]);
        assert!(matches!(labelled, RepoError::MongoDB(_)));
        assert!(labelled.is_transient_transaction_error());
        assert!(labelled.is_retryable());

        let unlabelled = write_concern_error(vec![]);
        assert!(!unlabelled.is_transient_transaction_error());
        assert!(!unlabelled.is_interrupted());
    }

    #[test]
    fn test_is_retryable() {
        assert!(RepoError::Timeout("test".to_string()).is_retryable());
        assert!(RepoError::Transient("test".to_string()).is_retryable());
        assert!(!RepoError::Cancelled("test".to_string()).is_retryable());
        assert!(!RepoError::Validation("test".to_string()).is_retryable());
    }

    #[test]
    fn test_is_not_found() {
        assert!(RepoError::NotFound("user".to_string()).is_not_found());
        assert!(!RepoError::Query("user".to_string()).is_not_found());
    }

    #[test]
    fn test_is_interrupted() {
        assert!(RepoError::Timeout("test".to_string()).is_interrupted());
        assert!(RepoError::Cancelled("test".to_string()).is_interrupted());
        assert!(!RepoError::Internal("test".to_string()).is_interrupted());
    }
}
