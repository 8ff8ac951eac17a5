use std::future::Future;

use super::{make_operation_with, parameters, TestResult};
use crate::{OperationDetails, OperationKind, OperationStore};

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "history",
        "list_is_newest_first",
        list_is_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_filters_by_kind",
        list_filters_by_kind(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "list_filters_by_instance",
        list_filters_by_instance(factory).await,
    ));

    results
}

fn upgrade() -> OperationDetails {
    OperationDetails::Upgrade {
        runtime_operation: Default::default(),
        orchestration_id: None,
    }
}

/// Inserted out of order; listed by descending `created_at`.
async fn list_is_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, minutes) in [("up-2", 20), ("up-1", 10), ("up-3", 30)] {
        s.insert(&make_operation_with(id, "instance-1", upgrade(), minutes))
            .await
            .map_err(|e| e.to_string())?;
    }

    let ids: Vec<String> = s
        .list_by_instance("instance-1", OperationKind::Upgrade)
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|op| op.id)
        .collect();
    if ids != ["up-3", "up-2", "up-1"] {
        return Err(format!("expected [up-3, up-2, up-1], got {ids:?}"));
    }
    Ok(())
}

async fn list_filters_by_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let provisioning = OperationDetails::Provisioning {
        parameters: parameters(),
    };
    s.insert(&make_operation_with("prov", "instance-1", provisioning, 0))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&make_operation_with("up", "instance-1", upgrade(), 5))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&make_operation_with(
        "susp",
        "instance-1",
        OperationDetails::Suspension {},
        10,
    ))
    .await
    .map_err(|e| e.to_string())?;

    for (kind, expected) in [
        (OperationKind::Provisioning, "prov"),
        (OperationKind::Upgrade, "up"),
        (OperationKind::Suspension, "susp"),
    ] {
        let ops = s
            .list_by_instance("instance-1", kind)
            .await
            .map_err(|e| e.to_string())?;
        if ops.len() != 1 || ops[0].id != expected {
            return Err(format!("{kind}: expected [{expected}], got {ops:?}"));
        }
    }

    let none = s
        .list_by_instance("instance-1", OperationKind::Deprovisioning)
        .await
        .map_err(|e| e.to_string())?;
    if !none.is_empty() {
        return Err(format!("expected no deprovisioning, got {none:?}"));
    }
    Ok(())
}

async fn list_filters_by_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(&make_operation_with("a", "instance-a", upgrade(), 0))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&make_operation_with("b", "instance-b", upgrade(), 0))
        .await
        .map_err(|e| e.to_string())?;

    let ops = s
        .list_by_instance("instance-a", OperationKind::Upgrade)
        .await
        .map_err(|e| e.to_string())?;
    if ops.len() != 1 || ops[0].instance_id != "instance-a" {
        return Err(format!("expected only instance-a, got {ops:?}"));
    }
    Ok(())
}
