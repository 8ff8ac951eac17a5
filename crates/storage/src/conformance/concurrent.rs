use std::future::Future;
use std::sync::Arc;

use super::{make_operation, TestResult};
use crate::{OperationState, OperationStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_inserts_exactly_one_wins",
        concurrent_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_operations_all_succeed",
        concurrent_updates_different_operations_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_final_version_increments_once",
        concurrent_updates_final_version_increments_once(factory).await,
    ));

    results
}

/// Spawn N tasks that each write `state` onto op-1 from version 0.
/// Returns (winners, losers).
async fn race_from_version_0<S: OperationStore>(
    storage: &Arc<S>,
) -> Result<(usize, usize), String> {
    let base = storage.get("op-1").await.map_err(|e| format!("get: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let mut attempt = base.clone();
        handles.push(tokio::spawn(async move {
            attempt.description = format!("writer-{i}");
            attempt.state = if i % 2 == 0 {
                OperationState::Succeeded
            } else {
                OperationState::Failed
            };
            match s.update(&attempt).await {
                Ok(_) => Ok(true),                             // won the race
                Err(StorageError::Conflict { .. }) => Ok(false), // lost the race
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each attempt to update the same operation from version 0.
/// Exactly one succeeds; the rest must get Conflict.
///
/// `tokio::spawn` creates parallel tasks that race against the OCC version
/// check, unlike the sequential simulation in the `version` module.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .insert(&make_operation("op-1", "instance-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let (winners, losers) = race_from_version_0(&storage).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

async fn concurrent_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.insert(&make_operation("op-1", "instance-1")).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        if handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?
        {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent updates to different operations: all succeed ────────────────

/// No false conflicts when there is no contention.
async fn concurrent_updates_different_operations_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        storage
            .insert(&make_operation(&format!("op-{i}"), "instance-1"))
            .await
            .map_err(|e| format!("insert op-{i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut op = s.get(&format!("op-{i}")).await?;
            op.state = OperationState::Succeeded;
            s.update(&op).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        let rec = storage
            .get(&format!("op-{i}"))
            .await
            .map_err(|e| format!("get op-{i}: {e}"))?;
        if rec.state != OperationState::Succeeded || rec.version != 1 {
            return Err(format!(
                "op-{i}: expected succeeded at version 1, got {} at {}",
                rec.state, rec.version
            ));
        }
    }
    Ok(())
}

// ── Concurrent updates: final version consistent ────────────────────────────

/// After the race the stored version is exactly 1 and the record is the
/// winner's write in full, never a blend of two writers.
async fn concurrent_updates_final_version_increments_once<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .insert(&make_operation("op-1", "instance-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    race_from_version_0(&storage).await?;

    let rec = storage.get("op-1").await.map_err(|e| format!("get: {e}"))?;
    if rec.version != 1 {
        return Err(format!(
            "expected version 1 after single winning update, got {}",
            rec.version
        ));
    }
    let writer: usize = rec
        .description
        .strip_prefix("writer-")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| format!("unexpected description {:?}", rec.description))?;
    let expected = if writer % 2 == 0 {
        OperationState::Succeeded
    } else {
        OperationState::Failed
    };
    if rec.state != expected {
        return Err(format!(
            "writer-{writer} wrote {expected} but record holds {}",
            rec.state
        ));
    }
    Ok(())
}
