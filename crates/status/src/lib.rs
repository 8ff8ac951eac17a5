//! Runtime status aggregation.
//!
//! Given one runtime's operation history per kind, pick the operation that
//! represents its current status and render the short label operators see.
//! Operations of different kinds are assumed not to overlap in time for the
//! same instance; that precondition is not checked here.

mod aggregate;
mod label;

pub use aggregate::{find_last_operation, load_runtime_status, runtime_status_label, RuntimeStatus};
pub use label::status_label;
