use std::future::Future;

use super::{seed, TestResult};
use crate::{OperationDetails, OperationKind, OperationState, OperationStore, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Basic version tracking
    results.push(TestResult::from_result(
        "version",
        "version_increments_to_one",
        version_increments_to_one(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_returns_stored_record",
        update_returns_stored_record(factory).await,
    ));

    // Wrong version fails
    results.push(TestResult::from_result(
        "version",
        "update_with_stale_version_returns_conflict",
        update_with_stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_future_version_returns_conflict",
        update_with_future_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_has_correct_fields",
        conflict_has_correct_fields(factory).await,
    ));

    // Conflict does not mutate state
    results.push(TestResult::from_result(
        "version",
        "conflict_does_not_change_record",
        conflict_does_not_change_record(factory).await,
    ));

    // Race conditions (sequential simulation)
    results.push(TestResult::from_result(
        "version",
        "two_readers_race_one_wins",
        two_readers_race_one_wins(factory).await,
    ));

    // Timestamps are store-owned
    results.push(TestResult::from_result(
        "version",
        "update_refreshes_updated_at",
        update_refreshes_updated_at(factory).await,
    ));

    // Kind is fixed at insert
    results.push(TestResult::from_result(
        "version",
        "update_cannot_change_kind",
        update_cannot_change_kind(factory).await,
    ));

    results
}

async fn version_increments_to_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = seed(&s, "op-1").await?;
    s.update(&op).await.map_err(|e| e.to_string())?;

    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec.version != 1 {
        return Err(format!("expected version 1, got {}", rec.version));
    }
    Ok(())
}

/// Feeding each returned record into the next update walks 1, 2, 3, ...
async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut op = seed(&s, "op-1").await?;
    for expected in 1..=5 {
        op.description = format!("step {expected}");
        op = s.update(&op).await.map_err(|e| e.to_string())?;
        if op.version != expected {
            return Err(format!("expected version {expected}, got {}", op.version));
        }
    }
    Ok(())
}

async fn update_returns_stored_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut op = seed(&s, "op-1").await?;
    op.state = OperationState::Failed;
    op.description = "boom".to_string();
    op.provisioner_operation_id = Some("prov-1".to_string());

    let returned = s.update(&op).await.map_err(|e| e.to_string())?;
    let stored = s.get("op-1").await.map_err(|e| e.to_string())?;
    if returned != stored {
        return Err(format!("returned {returned:?} but stored {stored:?}"));
    }
    if stored.description != "boom"
        || stored.state != OperationState::Failed
        || stored.provisioner_operation_id.as_deref() != Some("prov-1")
    {
        return Err(format!("update did not persist fields: {stored:?}"));
    }
    Ok(())
}

async fn update_with_stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = seed(&s, "op-1").await?;
    s.update(&op).await.map_err(|e| e.to_string())?;

    // `op` still carries version 0.
    match s.update(&op).await {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {other:?}")),
    }
}

async fn update_with_future_version_returns_conflict<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut op = seed(&s, "op-1").await?;
    op.version = 1;
    match s.update(&op).await {
        Err(StorageError::Conflict { .. }) => Ok(()),
        other => Err(format!("expected Conflict, got {other:?}")),
    }
}

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = seed(&s, "op-1").await?;
    let advanced = s.update(&op).await.map_err(|e| e.to_string())?;
    s.update(&advanced).await.map_err(|e| e.to_string())?;

    match s.update(&op).await {
        Err(StorageError::Conflict {
            id,
            expected_version,
            actual_version,
        }) => {
            if id != "op-1" || expected_version != 0 || actual_version != 2 {
                return Err(format!(
                    "expected (op-1, 0, 2), got ({id}, {expected_version}, {actual_version})"
                ));
            }
            Ok(())
        }
        other => Err(format!("expected Conflict, got {other:?}")),
    }
}

async fn conflict_does_not_change_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = seed(&s, "op-1").await?;
    let before = s.update(&op).await.map_err(|e| e.to_string())?;

    let mut stale = op.clone();
    stale.state = OperationState::Failed;
    stale.description = "should not land".to_string();
    let _ = s.update(&stale).await;

    let after = s.get("op-1").await.map_err(|e| e.to_string())?;
    if after != before {
        return Err(format!("conflict mutated record: {before:?} -> {after:?}"));
    }
    Ok(())
}

/// Two readers load version 0; the first write wins, the second conflicts.
async fn two_readers_race_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "op-1").await?;

    let mut first = s.get("op-1").await.map_err(|e| e.to_string())?;
    let mut second = s.get("op-1").await.map_err(|e| e.to_string())?;

    first.state = OperationState::Succeeded;
    second.state = OperationState::Failed;

    s.update(&first).await.map_err(|e| format!("first: {e}"))?;
    match s.update(&second).await {
        Err(StorageError::Conflict { .. }) => {}
        other => return Err(format!("expected second to conflict, got {other:?}")),
    }

    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec.state != OperationState::Succeeded || rec.version != 1 {
        return Err(format!(
            "expected winner's state at version 1, got {} at {}",
            rec.state, rec.version
        ));
    }
    Ok(())
}

/// `updated_at` comes from the store, not from the caller's record.
async fn update_refreshes_updated_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut op = seed(&s, "op-1").await?;
    let sent = op.updated_at - time::Duration::days(365);
    op.updated_at = sent;

    let stored = s.update(&op).await.map_err(|e| e.to_string())?;
    if stored.updated_at == sent {
        return Err("store accepted caller-supplied updated_at".to_string());
    }
    Ok(())
}

/// Rewriting `details` to another kind would move the record between
/// history streams; the store refuses and leaves the record untouched.
async fn update_cannot_change_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let op = seed(&s, "op-1").await?;
    let mut moved = op.clone();
    moved.details = OperationDetails::Suspension {};

    match s.update(&moved).await {
        Err(StorageError::KindMismatch {
            stored: OperationKind::Provisioning,
            requested: OperationKind::Suspension,
            ..
        }) => {}
        other => return Err(format!("expected KindMismatch, got {other:?}")),
    }

    let rec = s.get("op-1").await.map_err(|e| e.to_string())?;
    if rec.kind() != OperationKind::Provisioning || rec.version != op.version {
        return Err(format!("rejected write changed the record: {rec:?}"));
    }
    Ok(())
}
