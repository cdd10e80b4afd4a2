//! Datastore error types.

/// Error types for datastore operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record under the given key
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    /// The persistence engine rejected or failed the operation
    #[error("Datastore backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Create a not-found error for an entity kind and key.
    pub fn not_found(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Whether this error signals a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for datastore operations.
pub type Result<T> = std::result::Result<T, StoreError>;
