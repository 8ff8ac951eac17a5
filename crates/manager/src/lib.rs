//! Lifecycle operation manager.
//!
//! Records the outcome of each business step of a long-running operation
//! (provisioning, deprovisioning, upgrade, suspension, unsuspension) as a
//! persisted state transition:
//!
//! - [`OperationManager::succeed`] / [`OperationManager::fail`] end the operation
//! - [`OperationManager::retry`] keeps it `InProgress` and returns a delay,
//!   until the retry deadline measured from the last persisted transition
//!   passes
//!
//! Writes go through the store's optimistic-concurrency check; version
//! conflicts are retried against the latest record a bounded number of times.

pub mod config;
pub mod engine;
mod error;
mod manager;
pub mod retry;

pub use config::ManagerConfig;
pub use engine::{Executor, Queue, Step, StepOutcome};
pub use error::ManagerError;
pub use manager::{OperationManager, Transition};
pub use retry::{RetryDecision, RetryPolicy};
