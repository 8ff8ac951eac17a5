use lifecycle_storage::{OperationKind, OperationState};

/// Fallback for every state/kind pair the table does not name.
const FALLBACK: &str = "succeeded";

/// Render the status label for an operation of `kind` in `state`.
///
/// | state       | provision    | upgrade   | suspend                     | unsuspend                   | deprovision   |
/// |-------------|--------------|-----------|-----------------------------|-----------------------------|---------------|
/// | in progress | provisioning | upgrading | deprovisioning (suspending) | provisioning (unsuspending) | deprovisioning |
/// | succeeded   | succeeded    | succeeded | suspended                   | succeeded                   | deprovisioned |
/// | failed      | failed (provision) | failed (kyma upgrade) | failed (suspension) | failed (unsuspension) | failed (deprovision) |
///
/// Anything else, `pending` included, renders as `succeeded`.
pub fn status_label(state: OperationState, kind: OperationKind) -> String {
    match state {
        OperationState::InProgress => match kind {
            OperationKind::Provisioning => "provisioning",
            OperationKind::Upgrade => "upgrading",
            OperationKind::Suspension => "deprovisioning (suspending)",
            OperationKind::Unsuspension => "provisioning (unsuspending)",
            OperationKind::Deprovisioning => "deprovisioning",
        }
        .to_string(),
        OperationState::Succeeded => match kind {
            OperationKind::Suspension => "suspended",
            OperationKind::Deprovisioning => "deprovisioned",
            _ => FALLBACK,
        }
        .to_string(),
        OperationState::Failed => format!("failed ({kind})"),
        OperationState::Pending => FALLBACK.to_string(),
    }
}
