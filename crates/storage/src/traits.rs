use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{Operation, OperationKind};

/// The storage trait for lifecycle operation backends.
///
/// An `OperationStore` provides durable, keyed storage of [`Operation`]
/// records with optimistic-concurrency update semantics.
///
/// ## OCC Conflict Detection
///
/// `update` performs a compare-and-swap on `version`:
/// `UPDATE ... WHERE id = $1 AND version = $expected`. If zero rows are
/// affected the method returns `Err(StorageError::Conflict { .. })` and the
/// stored record is left untouched. A successful update persists the record
/// with `version + 1` and an `updated_at` taken from the store's own clock.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so independent workers can
/// share one store across async task boundaries.
#[async_trait]
pub trait OperationStore: Send + Sync + 'static {
    /// Insert a new operation exactly as given.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is already present.
    async fn insert(&self, operation: &Operation) -> Result<(), StorageError>;

    /// Apply a version-validated update (OCC).
    ///
    /// `operation.version` must equal the stored version. Returns the record
    /// as stored, i.e. with the incremented version and fresh `updated_at`.
    async fn update(&self, operation: &Operation) -> Result<Operation, StorageError>;

    /// Read an operation by id.
    ///
    /// Returns `Err(StorageError::NotFound)` if the operation does not exist.
    async fn get(&self, id: &str) -> Result<Operation, StorageError>;

    /// All operations of one kind for one instance, newest `created_at` first.
    async fn list_by_instance(
        &self,
        instance_id: &str,
        kind: OperationKind,
    ) -> Result<Vec<Operation>, StorageError>;
}
