//! Error types for the synchronizer.

use catalog::StoreError;

/// Failure reported by a collaborator service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Service cannot be reached
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Service refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Underlying datastore failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error types for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Console-origin resource without the application-name annotation
    #[error("appName is empty in application {namespace}/{name}")]
    MissingAppName { name: String, namespace: String },

    /// A write was attempted before the records it references exist
    #[error("{entity} {key} references missing {missing}")]
    MissingDependency {
        entity: &'static str,
        key: String,
        missing: String,
    },

    /// The live resource could not be converted
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// Datastore failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Collaborator service failure
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The caller cancelled the event
    #[error("Sync cancelled")]
    Cancelled,

    /// The event deadline passed
    #[error("Sync deadline exceeded")]
    DeadlineExceeded,
}

impl SyncError {
    /// Whether this error only reports a missing record.
    ///
    /// Watchers use this to drop deletes of applications that were never synced.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Store(err) | Self::Service(ServiceError::Store(err)) => err.is_not_found(),
            _ => false,
        }
    }
}

/// Result type for the synchronizer.
pub type Result<T> = std::result::Result<T, SyncError>;
