use std::time::Duration;

use lifecycle_storage::{Operation, OperationState, StorageError};

/// Errors returned by the operation manager and the step executor.
///
/// Two variants are *outcomes*, not malfunctions: [`ManagerError::OperationFailed`]
/// and [`ManagerError::RetryExhausted`] are returned after the `Failed` state
/// was persisted successfully. Both carry the stored operation; inspect it via
/// [`ManagerError::operation`]. A caller that only checks `is_err()` will still
/// stop scheduling the operation, which is the intent.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Store error that is not retried locally (not found, duplicate, backend).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Every update attempt lost the optimistic-concurrency race.
    #[error("operation {id}: update still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { id: String, attempts: u32 },

    /// The operation is already `Succeeded` or `Failed`.
    #[error("operation {id} is already {state}, no further transitions are permitted")]
    TerminalState { id: String, state: OperationState },

    /// The operation was marked `Failed` on request. Displays as `message`, verbatim.
    #[error("{message}")]
    OperationFailed {
        message: String,
        operation: Box<Operation>,
    },

    /// The retry deadline passed and the operation was marked `Failed`.
    #[error("retries exhausted after {}s: {message}", .max_time.as_secs())]
    RetryExhausted {
        message: String,
        max_time: Duration,
        operation: Box<Operation>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ManagerError {
    /// The persisted operation, for the variants that carry one.
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            ManagerError::OperationFailed { operation, .. }
            | ManagerError::RetryExhausted { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// Whether the error reports a persisted `Failed` outcome rather than a
    /// failure of the call itself.
    pub fn is_failed_outcome(&self) -> bool {
        self.operation().is_some()
    }
}
