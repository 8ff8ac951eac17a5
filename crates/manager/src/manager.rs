//! The operation manager: turns a step's outcome into a persisted state
//! transition plus a scheduling delay.
//!
//! Every method takes the caller's snapshot by reference and returns the
//! stored record in a [`Transition`]. The snapshot itself is never modified,
//! so a caller holding it after an error can still inspect what it sent.
//!
//! # Failure is reported as an error
//!
//! [`OperationManager::fail`] returns `Err(ManagerError::OperationFailed)`
//! even though the `Failed` state was written successfully, and an exhausted
//! [`OperationManager::retry`] returns `Err(ManagerError::RetryExhausted)`.
//! Callers that need to tell "the operation failed" apart from "the call
//! failed" use [`ManagerError::is_failed_outcome`].

use std::sync::Arc;
use std::time::Duration;

use lifecycle_storage::{
    Clock, Operation, OperationState, OperationStore, StorageError, SystemClock,
};
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::retry::{RetryDecision, RetryPolicy};

/// Result of a successful manager call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub operation: Operation,
    /// When to invoke the next step. Zero means no further steps.
    pub delay: Duration,
}

impl Transition {
    fn done(operation: Operation) -> Self {
        Self {
            operation,
            delay: Duration::ZERO,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.delay.is_zero()
    }
}

/// Records step outcomes for operations of every kind.
///
/// Holds no mutable state of its own; everything lives in the store, so one
/// manager can be shared by any number of workers.
pub struct OperationManager<S: OperationStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: ManagerConfig,
}

// Manual Clone implementation to avoid requiring S: Clone
impl<S: OperationStore> Clone for OperationManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: OperationStore> OperationManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, ManagerConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: ManagerConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the clock used for retry deadlines.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Move a `Pending` operation to `InProgress`.
    ///
    /// For a snapshot already in progress nothing is written; the stored
    /// record is returned once it is confirmed not to have finished.
    pub async fn start(&self, operation: &Operation) -> Result<Operation, ManagerError> {
        ensure_not_terminal(operation)?;
        if operation.state == OperationState::InProgress {
            let current = self.store.get(&operation.id).await?;
            ensure_not_terminal(&current)?;
            return Ok(current);
        }
        self.persist(operation, Some(OperationState::InProgress), |op| {
            op.state = OperationState::InProgress;
        })
        .await
    }

    /// Mark the operation `Succeeded`. The delay is always zero.
    pub async fn succeed(
        &self,
        operation: &Operation,
        description: &str,
    ) -> Result<Transition, ManagerError> {
        ensure_not_terminal(operation)?;
        let stored = self
            .persist(operation, Some(OperationState::Succeeded), |op| {
                op.state = OperationState::Succeeded;
                op.description = description.to_string();
            })
            .await?;
        info!(
            operation_id = %stored.id,
            instance_id = %stored.instance_id,
            kind = %stored.kind(),
            "operation succeeded"
        );
        Ok(Transition::done(stored))
    }

    /// Mark the operation `Failed` with `message` as its description.
    ///
    /// On success this still returns `Err(ManagerError::OperationFailed)`,
    /// whose `Display` is exactly `message` and which carries the stored
    /// operation. Any other error means the write itself did not happen.
    pub async fn fail(
        &self,
        operation: &Operation,
        message: &str,
    ) -> Result<Transition, ManagerError> {
        ensure_not_terminal(operation)?;
        let stored = self.persist_failed(operation, message).await?;
        Err(ManagerError::OperationFailed {
            message: message.to_string(),
            operation: Box::new(stored),
        })
    }

    /// Ask for another attempt after `retry_interval`, unless `max_time` has
    /// passed since the operation's last persisted transition.
    ///
    /// While budget remains the operation stays `InProgress`, nothing is
    /// written, and the returned snapshot carries `message` as its
    /// description. Writing here would refresh `updated_at` and restart the
    /// deadline on every attempt. Past the deadline the operation is failed
    /// and `Err(ManagerError::RetryExhausted)` is returned.
    pub async fn retry(
        &self,
        operation: &Operation,
        message: &str,
        retry_interval: Duration,
        max_time: Duration,
    ) -> Result<Transition, ManagerError> {
        ensure_not_terminal(operation)?;

        let policy = RetryPolicy::new(retry_interval, max_time);
        match policy.decide(operation.updated_at, self.clock.now()) {
            RetryDecision::Retry { delay, elapsed } => {
                info!(
                    operation_id = %operation.id,
                    instance_id = %operation.instance_id,
                    kind = %operation.kind(),
                    elapsed_secs = elapsed.as_secs(),
                    max_time_secs = max_time.as_secs(),
                    delay_secs = delay.as_secs(),
                    "retrying operation: {message}"
                );

                // A stale snapshot must not be retried past a terminal write.
                let current = self.store.get(&operation.id).await?;
                ensure_not_terminal(&current)?;

                let mut next = operation.clone();
                next.description = message.to_string();
                Ok(Transition {
                    operation: next,
                    delay,
                })
            }
            RetryDecision::Exhausted { elapsed } => {
                error!(
                    operation_id = %operation.id,
                    instance_id = %operation.instance_id,
                    kind = %operation.kind(),
                    elapsed_secs = elapsed.as_secs(),
                    max_time_secs = max_time.as_secs(),
                    "aborting after {}s of failing retries: {message}",
                    max_time.as_secs()
                );
                let stored = self.persist_failed(operation, message).await?;
                Err(ManagerError::RetryExhausted {
                    message: message.to_string(),
                    max_time,
                    operation: Box::new(stored),
                })
            }
        }
    }

    /// Persist a payload change (provisioner id, kind details, description)
    /// without changing state or kind. Details of another kind are dropped.
    /// Refused once the operation is terminal.
    pub async fn update_operation<F>(
        &self,
        operation: &Operation,
        mut update: F,
    ) -> Result<Operation, ManagerError>
    where
        F: FnMut(&mut Operation) + Send,
    {
        ensure_not_terminal(operation)?;
        self.persist(operation, None, |op| {
            let state = op.state;
            let details = op.details.clone();
            update(op);
            op.state = state;
            if op.kind() != details.kind() {
                op.details = details;
            }
        })
        .await
    }

    async fn persist_failed(
        &self,
        operation: &Operation,
        message: &str,
    ) -> Result<Operation, ManagerError> {
        let stored = self
            .persist(operation, Some(OperationState::Failed), |op| {
                op.state = OperationState::Failed;
                op.description = message.to_string();
            })
            .await?;
        warn!(
            operation_id = %stored.id,
            instance_id = %stored.instance_id,
            kind = %stored.kind(),
            "operation failed: {message}"
        );
        Ok(stored)
    }

    /// Write `apply(snapshot)`; on a version conflict re-read the latest
    /// record and reapply, up to `conflict_max_attempts` writes in total.
    ///
    /// If a re-read shows a terminal record equal to `target`, a concurrent
    /// worker already applied this transition and that record is returned.
    /// Any other terminal record ends the loop with `TerminalState`.
    async fn persist<F>(
        &self,
        snapshot: &Operation,
        target: Option<OperationState>,
        mut apply: F,
    ) -> Result<Operation, ManagerError>
    where
        F: FnMut(&mut Operation) + Send,
    {
        let attempts = self.config.conflict_max_attempts.max(1);
        let mut current = snapshot.clone();

        for attempt in 1..=attempts {
            let mut next = current.clone();
            apply(&mut next);

            match self.store.update(&next).await {
                Ok(stored) => {
                    debug!(
                        operation_id = %stored.id,
                        version = stored.version,
                        state = %stored.state,
                        attempt,
                        "operation persisted"
                    );
                    return Ok(stored);
                }
                Err(StorageError::Conflict {
                    expected_version,
                    actual_version,
                    ..
                }) => {
                    warn!(
                        operation_id = %snapshot.id,
                        expected_version,
                        actual_version,
                        attempt,
                        "version conflict while persisting operation"
                    );
                    if attempt == attempts {
                        break;
                    }
                    tokio::time::sleep(self.config.conflict_backoff).await;

                    current = self.store.get(&snapshot.id).await?;
                    if current.is_terminal() {
                        if target == Some(current.state) {
                            debug!(
                                operation_id = %current.id,
                                state = %current.state,
                                "transition already applied by another worker"
                            );
                            return Ok(current);
                        }
                        return Err(terminal(&current));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ManagerError::ConflictRetriesExhausted {
            id: snapshot.id.clone(),
            attempts,
        })
    }
}

fn terminal(operation: &Operation) -> ManagerError {
    ManagerError::TerminalState {
        id: operation.id.clone(),
        state: operation.state,
    }
}

fn ensure_not_terminal(operation: &Operation) -> Result<(), ManagerError> {
    if operation.is_terminal() {
        return Err(terminal(operation));
    }
    Ok(())
}
