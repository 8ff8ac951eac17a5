use lifecycle_storage::{Operation, OperationKind, OperationStore, StorageError};
use serde::{Deserialize, Serialize};

use crate::label::status_label;

/// One runtime's operation history, per kind, each list newest-first.
///
/// Provisioning and deprovisioning happen at most once per runtime, so only
/// their latest record is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    #[serde(default)]
    pub provisioning: Option<Operation>,
    #[serde(default)]
    pub deprovisioning: Option<Operation>,
    #[serde(default)]
    pub upgrading: Vec<Operation>,
    #[serde(default)]
    pub suspension: Vec<Operation>,
    #[serde(default)]
    pub unsuspension: Vec<Operation>,
}

/// Read every kind's history for `instance_id` from the store.
pub async fn load_runtime_status<S: OperationStore + ?Sized>(
    store: &S,
    instance_id: &str,
) -> Result<RuntimeStatus, StorageError> {
    let latest = |mut ops: Vec<Operation>| {
        if ops.is_empty() {
            None
        } else {
            Some(ops.swap_remove(0))
        }
    };

    Ok(RuntimeStatus {
        provisioning: latest(
            store
                .list_by_instance(instance_id, OperationKind::Provisioning)
                .await?,
        ),
        deprovisioning: latest(
            store
                .list_by_instance(instance_id, OperationKind::Deprovisioning)
                .await?,
        ),
        upgrading: store
            .list_by_instance(instance_id, OperationKind::Upgrade)
            .await?,
        suspension: store
            .list_by_instance(instance_id, OperationKind::Suspension)
            .await?,
        unsuspension: store
            .list_by_instance(instance_id, OperationKind::Unsuspension)
            .await?,
    })
}

/// The operation that defines the runtime's current status.
///
/// Starts from provisioning, then lets upgrade, unsuspension, suspension and
/// deprovisioning (in that order) take over whenever their newest record was
/// created strictly later than the current pick. `None` only when the
/// runtime has no operations at all.
pub fn find_last_operation(status: &RuntimeStatus) -> Option<(&Operation, OperationKind)> {
    let mut last = status
        .provisioning
        .as_ref()
        .map(|op| (op, OperationKind::Provisioning));

    let candidates = [
        (status.upgrading.first(), OperationKind::Upgrade),
        (status.unsuspension.first(), OperationKind::Unsuspension),
        (status.suspension.first(), OperationKind::Suspension),
        (status.deprovisioning.as_ref(), OperationKind::Deprovisioning),
    ];
    for (candidate, kind) in candidates {
        let Some(op) = candidate else { continue };
        let newer = match last {
            Some((current, _)) => op.created_at > current.created_at,
            None => true,
        };
        if newer {
            last = Some((op, kind));
        }
    }
    last
}

/// Label for the runtime's current status; `succeeded` when it has no history.
pub fn runtime_status_label(status: &RuntimeStatus) -> String {
    match find_last_operation(status) {
        Some((op, kind)) => status_label(op.state, kind),
        None => "succeeded".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_storage::{OperationDetails, OperationState};
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    const T0: OffsetDateTime = datetime!(2025-01-01 0:00 UTC);

    fn op(id: &str, details: OperationDetails, minutes: i64, state: OperationState) -> Operation {
        let mut op = Operation::new("instance-1", details, T0 + Duration::minutes(minutes));
        op.id = id.to_string();
        op.state = state;
        op
    }

    fn provisioning(minutes: i64, state: OperationState) -> Operation {
        op(
            "prov",
            OperationDetails::Provisioning {
                parameters: Default::default(),
            },
            minutes,
            state,
        )
    }

    fn upgrade(id: &str, minutes: i64, state: OperationState) -> Operation {
        op(
            id,
            OperationDetails::Upgrade {
                runtime_operation: Default::default(),
                orchestration_id: None,
            },
            minutes,
            state,
        )
    }

    fn suspension(id: &str, minutes: i64, state: OperationState) -> Operation {
        op(id, OperationDetails::Suspension {}, minutes, state)
    }

    fn unsuspension(id: &str, minutes: i64, state: OperationState) -> Operation {
        op(
            id,
            OperationDetails::Unsuspension {
                parameters: Default::default(),
            },
            minutes,
            state,
        )
    }

    fn deprovisioning(minutes: i64, state: OperationState) -> Operation {
        op(
            "deprov",
            OperationDetails::Deprovisioning {
                parameters: Default::default(),
            },
            minutes,
            state,
        )
    }

    #[test]
    fn provisioning_only() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::InProgress)),
            ..Default::default()
        };
        let (op, kind) = find_last_operation(&status).unwrap();
        assert_eq!(op.id, "prov");
        assert_eq!(kind, OperationKind::Provisioning);
        assert_eq!(runtime_status_label(&status), "provisioning");
    }

    #[test]
    fn later_upgrade_wins_over_provisioning() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::InProgress)),
            upgrading: vec![upgrade("up", 10, OperationState::InProgress)],
            ..Default::default()
        };
        assert_eq!(runtime_status_label(&status), "upgrading");
    }

    #[test]
    fn only_newest_record_of_a_kind_counts() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::Succeeded)),
            upgrading: vec![
                upgrade("up-new", 30, OperationState::Failed),
                upgrade("up-old", 10, OperationState::Succeeded),
            ],
            ..Default::default()
        };
        let (op, _) = find_last_operation(&status).unwrap();
        assert_eq!(op.id, "up-new");
        assert_eq!(runtime_status_label(&status), "failed (kyma upgrade)");
    }

    #[test]
    fn equal_created_at_keeps_earlier_pick() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(5, OperationState::Succeeded)),
            suspension: vec![suspension("susp", 5, OperationState::InProgress)],
            ..Default::default()
        };
        assert_eq!(
            find_last_operation(&status).unwrap().1,
            OperationKind::Provisioning
        );
    }

    #[test]
    fn suspend_unsuspend_cycle_follows_newest() {
        let mut status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::Succeeded)),
            suspension: vec![suspension("susp-1", 10, OperationState::Succeeded)],
            ..Default::default()
        };
        assert_eq!(runtime_status_label(&status), "suspended");

        status.unsuspension = vec![unsuspension("unsusp-1", 20, OperationState::InProgress)];
        assert_eq!(runtime_status_label(&status), "provisioning (unsuspending)");

        status.suspension.insert(0, suspension("susp-2", 30, OperationState::InProgress));
        assert_eq!(runtime_status_label(&status), "deprovisioning (suspending)");
    }

    #[test]
    fn deprovisioning_is_checked_last() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::Succeeded)),
            upgrading: vec![upgrade("up", 10, OperationState::Succeeded)],
            deprovisioning: Some(deprovisioning(20, OperationState::Succeeded)),
            ..Default::default()
        };
        assert_eq!(runtime_status_label(&status), "deprovisioned");
    }

    #[test]
    fn missing_provisioning_still_selects_newest() {
        let status = RuntimeStatus {
            suspension: vec![suspension("susp", 10, OperationState::Failed)],
            ..Default::default()
        };
        assert_eq!(runtime_status_label(&status), "failed (suspension)");
    }

    #[test]
    fn empty_history_renders_succeeded() {
        let status = RuntimeStatus::default();
        assert!(find_last_operation(&status).is_none());
        assert_eq!(runtime_status_label(&status), "succeeded");
    }

    #[test]
    fn pending_operation_falls_back_to_succeeded() {
        let status = RuntimeStatus {
            provisioning: Some(provisioning(0, OperationState::Pending)),
            ..Default::default()
        };
        assert_eq!(runtime_status_label(&status), "succeeded");
    }
}
