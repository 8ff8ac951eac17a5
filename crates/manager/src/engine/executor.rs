use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use lifecycle_storage::{Operation, OperationKind, OperationState, OperationStore};
use tracing::{debug, info};

use super::{Step, StepOutcome};
use crate::error::ManagerError;
use crate::manager::OperationManager;

/// Runs the registered steps of an operation's kind and records the result.
pub struct Executor<S: OperationStore> {
    manager: OperationManager<S>,
    steps: BTreeMap<OperationKind, Vec<Arc<dyn Step>>>,
}

impl<S: OperationStore> Executor<S> {
    pub fn new(manager: OperationManager<S>) -> Self {
        Self {
            manager,
            steps: BTreeMap::new(),
        }
    }

    /// Append a step to `kind`'s pipeline.
    pub fn with_step(mut self, kind: OperationKind, step: impl Step + 'static) -> Self {
        self.steps.entry(kind).or_default().push(Arc::new(step));
        self
    }

    pub fn manager(&self) -> &OperationManager<S> {
        &self.manager
    }

    /// Run one iteration for `operation_id`.
    ///
    /// Returns the delay after which the operation should be executed again,
    /// or `Duration::ZERO` once it has finished. A `Failed` outcome surfaces
    /// as the manager's error.
    pub async fn execute(&self, operation_id: &str) -> Result<Duration, ManagerError> {
        let mut operation = self.manager.store().get(operation_id).await?;
        if operation.is_terminal() {
            debug!(operation_id, state = %operation.state, "operation already finished");
            return Ok(Duration::ZERO);
        }
        if operation.state == OperationState::Pending {
            operation = self.manager.start(&operation).await?;
        }

        let steps = self
            .steps
            .get(&operation.kind())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for step in steps {
            debug!(operation_id, step = step.name(), "running step");
            match step.run(&operation).await {
                StepOutcome::Continue(next) => {
                    if next != operation {
                        operation = self
                            .manager
                            .update_operation(&operation, |op| copy_payload(op, &next))
                            .await?;
                    }
                }
                StepOutcome::Succeeded(description) => {
                    return self
                        .manager
                        .succeed(&operation, &description)
                        .await
                        .map(|t| t.delay);
                }
                StepOutcome::Failed(message) => {
                    info!(operation_id, step = step.name(), "step failed");
                    return self.manager.fail(&operation, &message).await.map(|t| t.delay);
                }
                StepOutcome::Retry {
                    message,
                    interval,
                    max_time,
                } => {
                    return self
                        .manager
                        .retry(&operation, &message, interval, max_time)
                        .await
                        .map(|t| t.delay);
                }
            }
        }

        self.manager
            .succeed(&operation, "Operation succeeded")
            .await
            .map(|t| t.delay)
    }
}

/// Fields a step may change through `Continue`. Identity, version, state and
/// timestamps stay under the manager's control.
fn copy_payload(target: &mut Operation, source: &Operation) {
    target.description = source.description.clone();
    target.provisioner_operation_id = source.provisioner_operation_id.clone();
    if source.details.kind() == target.details.kind() {
        target.details = source.details.clone();
    }
}
