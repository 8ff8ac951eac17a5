use std::future::Future;

use super::{make_operation, TestResult};
use crate::{OperationKind, OperationStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_nonexistent_returns_not_found",
        get_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_nonexistent_returns_not_found",
        update_nonexistent_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_nonexistent_does_not_create",
        update_nonexistent_does_not_create(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_empty_for_nonexistent_instance",
        list_empty_for_nonexistent_instance(factory).await,
    ));

    results
}

// ── 1. get on empty store returns NotFound ───────────────────────────────────

async fn get_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("op-999").await {
        Err(StorageError::NotFound { id }) if id == "op-999" => Ok(()),
        other => Err(format!("expected NotFound for op-999, got {other:?}")),
    }
}

// ── 2. update of a missing record is NotFound, never an upsert ──────────────

async fn update_nonexistent_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.update(&make_operation("op-999", "instance-1")).await {
        Err(StorageError::NotFound { id }) if id == "op-999" => Ok(()),
        other => Err(format!("expected NotFound for op-999, got {other:?}")),
    }
}

async fn update_nonexistent_does_not_create<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let _ = s.update(&make_operation("op-999", "instance-1")).await;
    match s.get("op-999").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        other => Err(format!("update created a record: {other:?}")),
    }
}

// ── 3. listing an unknown instance is empty, not an error ───────────────────

async fn list_empty_for_nonexistent_instance<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ops = s
        .list_by_instance("instance-999", OperationKind::Provisioning)
        .await
        .map_err(|e| e.to_string())?;
    if !ops.is_empty() {
        return Err(format!("expected no operations, got {}", ops.len()));
    }
    Ok(())
}
