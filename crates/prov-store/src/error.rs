use prov_types::{Uid, VerifyKey};

use crate::policy::Access;

/// Errors from document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The credential lacks the capability for this operation.
    #[error("permission denied: {credential} may not {access} in partition '{partition}'")]
    PermissionDenied {
        credential: VerifyKey,
        partition: String,
        access: Access,
    },

    /// The referenced UID does not exist in the partition.
    #[error("document {uid} not found in partition '{partition}'")]
    NotFound { partition: String, uid: Uid },

    /// A UID or a unique secondary key value is already taken.
    #[error("duplicate key in partition '{partition}': {key}={value}")]
    DuplicateKey {
        partition: String,
        key: String,
        value: String,
    },

    /// A payload, query value or indexed field has the wrong declared type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// No partition is registered under this name.
    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    /// The partition does not declare this key.
    #[error("partition '{partition}' has no key '{key}'")]
    UnknownPartitionKey { partition: String, key: String },

    /// A partition with this name exists with different settings.
    #[error("partition '{0}' already registered with different settings")]
    PartitionConflict(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend could not complete the operation (e.g. poisoned lock).
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a [`StoreError::TypeMismatch`].
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
