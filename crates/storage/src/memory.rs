//! In-memory `OperationStore`, used as a test double and for local runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::record::{Operation, OperationKind};
use crate::traits::OperationStore;

/// A map of operations guarded by a single lock. Not durable.
///
/// The version check and the write happen under the same write guard, so
/// concurrent updates from one version see exactly one winner.
pub struct MemoryStore {
    operations: RwLock<HashMap<String, Operation>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored operations.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A poisoned lock only means another thread panicked mid-test; the map
    // itself is never left half-written.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Operation>> {
        self.operations.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Operation>> {
        self.operations.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl OperationStore for MemoryStore {
    async fn insert(&self, operation: &Operation) -> Result<(), StorageError> {
        let mut operations = self.write();
        if operations.contains_key(&operation.id) {
            return Err(StorageError::AlreadyExists {
                id: operation.id.clone(),
            });
        }
        operations.insert(operation.id.clone(), operation.clone());
        Ok(())
    }

    async fn update(&self, operation: &Operation) -> Result<Operation, StorageError> {
        let mut operations = self.write();
        let stored = operations
            .get_mut(&operation.id)
            .ok_or_else(|| StorageError::NotFound {
                id: operation.id.clone(),
            })?;
        if stored.version != operation.version {
            return Err(StorageError::Conflict {
                id: operation.id.clone(),
                expected_version: operation.version,
                actual_version: stored.version,
            });
        }
        if operation.kind() != stored.kind() {
            return Err(StorageError::KindMismatch {
                id: operation.id.clone(),
                stored: stored.kind(),
                requested: operation.kind(),
            });
        }

        let mut next = operation.clone();
        next.version = stored.version + 1;
        next.updated_at = self.clock.now();
        // Identity fields are immutable regardless of what the caller sent.
        next.created_at = stored.created_at;
        next.instance_id = stored.instance_id.clone();
        *stored = next.clone();
        Ok(next)
    }

    async fn get(&self, id: &str) -> Result<Operation, StorageError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn list_by_instance(
        &self,
        instance_id: &str,
        kind: OperationKind,
    ) -> Result<Vec<Operation>, StorageError> {
        let mut found: Vec<Operation> = self
            .read()
            .values()
            .filter(|op| op.instance_id == instance_id && op.kind() == kind)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
