//! The calling contract between business steps and the operation manager.
//!
//! Steps decide *what* happened; the [`Executor`] routes that to the
//! [`OperationManager`](crate::OperationManager) and hands back a delay; the
//! [`Queue`] owns the scheduling. The manager itself never sleeps for a
//! retry delay.

mod executor;
mod queue;

use std::time::Duration;

use async_trait::async_trait;
use lifecycle_storage::Operation;

pub use executor::Executor;
pub use queue::Queue;

/// What a step reports back after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Done; move to the next step. Payload changes on the returned
    /// operation (description, provisioner id, details) are persisted.
    Continue(Operation),
    /// The whole operation is complete.
    Succeeded(String),
    /// The operation cannot complete.
    Failed(String),
    /// Transient failure; try again after `interval` unless `max_time` has
    /// passed since the last persisted transition.
    Retry {
        message: String,
        interval: Duration,
        max_time: Duration,
    },
}

/// One unit of business work for an operation kind.
///
/// Every iteration replays the step list from the start against the latest
/// stored snapshot, so steps must be idempotent: a step whose effect is
/// already recorded on the operation should return `Continue` unchanged.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, operation: &Operation) -> StepOutcome;
}
