use std::future::Future;

use super::{make_operation, TestResult};
use crate::{OperationState, OperationStore, StorageError};

pub(super) async fn run_insert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "insert",
        "insert_then_get_returns_same_record",
        insert_then_get_returns_same_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "insert_keeps_version_0",
        insert_keeps_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "double_insert_returns_already_exists",
        double_insert_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "double_insert_does_not_overwrite",
        double_insert_does_not_overwrite(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "different_ids_are_independent",
        different_ids_are_independent(factory).await,
    ));
    results.push(TestResult::from_result(
        "insert",
        "inserted_operation_updatable",
        inserted_operation_updatable(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A get after insert returns the record exactly as inserted.
async fn insert_then_get_returns_same_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = make_operation("op-1", "instance-1");
    s.insert(&op).await.map_err(|e| e.to_string())?;

    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec != op {
        return Err(format!("expected {op:?}, got {rec:?}"));
    }
    Ok(())
}

async fn insert_keeps_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(&make_operation("op-1", "instance-1"))
        .await
        .map_err(|e| e.to_string())?;
    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    Ok(())
}

async fn double_insert_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = make_operation("op-1", "instance-1");
    s.insert(&op).await.map_err(|e| e.to_string())?;

    match s.insert(&op).await {
        Err(StorageError::AlreadyExists { id }) if id == "op-1" => Ok(()),
        other => Err(format!("expected AlreadyExists for op-1, got {other:?}")),
    }
}

/// A rejected duplicate insert leaves the original record intact.
async fn double_insert_does_not_overwrite<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = make_operation("op-1", "instance-1");
    s.insert(&op).await.map_err(|e| e.to_string())?;

    let mut duplicate = make_operation("op-1", "instance-2");
    duplicate.description = "impostor".to_string();
    let _ = s.insert(&duplicate).await;

    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec.instance_id != "instance-1" || rec.description != op.description {
        return Err(format!("duplicate insert overwrote record: {rec:?}"));
    }
    Ok(())
}

async fn different_ids_are_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert(&make_operation("op-1", "instance-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert(&make_operation("op-2", "instance-1"))
        .await
        .map_err(|e| e.to_string())?;

    let a = s.get("op-1").await.map_err(|e| e.to_string())?;
    let b = s.get("op-2").await.map_err(|e| e.to_string())?;
    if a.id != "op-1" || b.id != "op-2" {
        return Err(format!("expected op-1/op-2, got {}/{}", a.id, b.id));
    }
    Ok(())
}

async fn inserted_operation_updatable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut op = make_operation("op-1", "instance-1");
    s.insert(&op).await.map_err(|e| e.to_string())?;

    op.state = OperationState::Succeeded;
    let stored = s.update(&op).await.map_err(|e| e.to_string())?;
    if stored.state != OperationState::Succeeded || stored.version != 1 {
        return Err(format!(
            "expected succeeded at version 1, got {} at version {}",
            stored.state, stored.version
        ));
    }
    Ok(())
}
