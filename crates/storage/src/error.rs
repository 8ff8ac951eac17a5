use crate::record::OperationKind;

/// All errors that can be returned by an OperationStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another writer modified
    /// the operation since the caller read it.
    #[error(
        "concurrent conflict on operation {id}: expected version {expected_version}, found {actual_version}"
    )]
    Conflict {
        id: String,
        expected_version: i64,
        actual_version: i64,
    },

    /// No operation with the given id.
    #[error("operation not found: {id}")]
    NotFound { id: String },

    /// An operation with this id has already been inserted.
    #[error("operation already exists: {id}")]
    AlreadyExists { id: String },

    /// The write would move the operation into another kind's history.
    #[error("operation {id} is a {stored} operation and cannot be rewritten as {requested}")]
    KindMismatch {
        id: String,
        stored: OperationKind,
        requested: OperationKind,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
