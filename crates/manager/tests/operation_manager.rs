//! Operation manager behaviour against the in-memory store.
//!
//! Covers the outcome contract of `succeed`, `fail` and `retry`, the
//! cumulative retry deadline, terminal-state immutability, and workers
//! racing on the same operation.

use std::sync::Arc;
use std::time::Duration;

use lifecycle_manager::{ManagerConfig, ManagerError, OperationManager};
use lifecycle_storage::{
    Clock, ManualClock, MemoryStore, Operation, OperationDetails, OperationState, OperationStore,
    Runtime, RuntimeOperation,
};
use time::macros::datetime;
use time::OffsetDateTime;

const HOUR: Duration = Duration::from_secs(3600);

// ──────────────────────────────────────────────
// Test fixtures
// ──────────────────────────────────────────────

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lifecycle_manager=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

fn fix_upgrade_operation(now: OffsetDateTime) -> Operation {
    Operation {
        id: "2c538027-d1c4-41ef-a26c-c9604483cb6d".to_string(),
        version: 0,
        instance_id: "2b6645a1-87e7-491d-bce3-cc0fbe16b6c0".to_string(),
        state: OperationState::InProgress,
        description: "op description".to_string(),
        created_at: now,
        updated_at: now,
        provisioner_operation_id: None,
        details: OperationDetails::Upgrade {
            runtime_operation: RuntimeOperation {
                runtime: Runtime {
                    runtime_id: "runtime-1".to_string(),
                    sub_account_id: "sub-account-1".to_string(),
                    shoot_name: Some("c-178e034".to_string()),
                },
                dry_run: false,
            },
            orchestration_id: Some("orchestration-1".to_string()),
        },
    }
}

struct Fixture {
    clock: Arc<ManualClock>,
    store: Arc<MemoryStore>,
    manager: OperationManager<MemoryStore>,
    operation: Operation,
}

async fn fixture() -> Fixture {
    init_test_logging();
    let clock = Arc::new(ManualClock::new(datetime!(2025-03-01 9:00 UTC)));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let manager = OperationManager::with_config(
        store.clone(),
        ManagerConfig {
            conflict_backoff: Duration::from_millis(1),
            ..ManagerConfig::default()
        },
    )
    .with_clock(clock.clone());
    let operation = fix_upgrade_operation(clock.now());
    store.insert(&operation).await.expect("insert");
    Fixture {
        clock,
        store,
        manager,
        operation,
    }
}

// ──────────────────────────────────────────────
// succeed / fail
// ──────────────────────────────────────────────

#[tokio::test]
async fn operation_succeeded() {
    let f = fixture().await;

    let transition = f
        .manager
        .succeed(&f.operation, "task succeeded")
        .await
        .unwrap();

    assert_eq!(transition.operation.state, OperationState::Succeeded);
    assert_eq!(transition.operation.description, "task succeeded");
    assert_eq!(transition.delay, Duration::ZERO);
    assert!(transition.is_finished());
    assert_eq!(f.store.get(&f.operation.id).await.unwrap(), transition.operation);
}

#[tokio::test]
async fn operation_failed_reports_message_verbatim() {
    let f = fixture().await;
    let err_msg = "task failed miserably";

    let err = f.manager.fail(&f.operation, err_msg).await.unwrap_err();

    assert_eq!(err.to_string(), err_msg);
    let failed = err.operation().expect("failed operation attached");
    assert_eq!(failed.state, OperationState::Failed);
    assert_eq!(failed.description, err_msg);

    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.state, OperationState::Failed);
    assert_eq!(stored.description, err_msg);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn snapshot_is_left_untouched() {
    let f = fixture().await;
    let before = f.operation.clone();

    let _ = f.manager.fail(&f.operation, "boom").await;

    assert_eq!(f.operation, before);
}

#[tokio::test]
async fn persisted_updated_at_comes_from_store_clock() {
    let f = fixture().await;
    f.clock.advance(time::Duration::minutes(7));

    let transition = f.manager.succeed(&f.operation, "done").await.unwrap();

    assert_eq!(transition.operation.updated_at, datetime!(2025-03-01 9:07 UTC));
    assert_eq!(transition.operation.created_at, f.operation.created_at);
}

// ──────────────────────────────────────────────
// retry
// ──────────────────────────────────────────────

#[tokio::test]
async fn retry_operation() {
    let f = fixture().await;
    let retry_interval = HOUR;
    let max_time = 3 * HOUR; // allow 2 retries

    // first call
    let first = f
        .manager
        .retry(&f.operation, "task failed", retry_interval, max_time)
        .await
        .unwrap();
    assert!(first.delay > Duration::ZERO);
    assert_eq!(first.operation.state, OperationState::InProgress);
    assert_eq!(first.operation.description, "task failed");

    // simulate the wait of the first retry
    let mut op = first.operation;
    op.updated_at -= time::Duration::hours(1) + time::Duration::seconds(1);
    let second = f
        .manager
        .retry(&op, "task failed", retry_interval, max_time)
        .await
        .unwrap();
    assert!(second.delay > Duration::ZERO);
}

#[tokio::test]
async fn retry_does_not_reset_the_deadline() {
    let f = fixture().await;

    let first = f
        .manager
        .retry(&f.operation, "still waiting", HOUR, 3 * HOUR)
        .await
        .unwrap();

    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.version, 0);
    assert_eq!(stored.updated_at, f.operation.updated_at);
    assert_eq!(first.operation.updated_at, f.operation.updated_at);
}

#[tokio::test]
async fn retry_deadline_is_cumulative() {
    let f = fixture().await;
    let mut op = f.operation.clone();

    for _ in 0..2 {
        f.clock.advance(time::Duration::hours(1) + time::Duration::seconds(1));
        let t = f
            .manager
            .retry(&op, "runtime not ready", HOUR, 3 * HOUR)
            .await
            .unwrap();
        assert_eq!(t.delay, HOUR);
        op = t.operation;
    }

    f.clock.advance(time::Duration::hours(1));
    let err = f
        .manager
        .retry(&op, "runtime not ready", HOUR, 3 * HOUR)
        .await
        .unwrap_err();

    assert!(matches!(err, ManagerError::RetryExhausted { .. }), "{err}");
    assert!(err.to_string().contains("runtime not ready"), "{err}");
    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.state, OperationState::Failed);
    assert_eq!(stored.description, "runtime not ready");
}

#[tokio::test]
async fn retry_fails_once_elapsed_reaches_max_time() {
    let f = fixture().await;
    let mut op = f.operation.clone();
    op.updated_at -= time::Duration::hours(3);

    let err = f
        .manager
        .retry(&op, "task failed", HOUR, 3 * HOUR)
        .await
        .unwrap_err();

    assert!(err.is_failed_outcome());
    assert_eq!(err.operation().unwrap().state, OperationState::Failed);
}

// ──────────────────────────────────────────────
// terminal-state immutability
// ──────────────────────────────────────────────

#[tokio::test]
async fn terminal_operations_reject_every_transition() {
    let f = fixture().await;
    let done = f
        .manager
        .succeed(&f.operation, "task succeeded")
        .await
        .unwrap()
        .operation;

    let results = [
        f.manager.succeed(&done, "again").await.map(|_| ()),
        f.manager.fail(&done, "late failure").await.map(|_| ()),
        f.manager
            .retry(&done, "late retry", HOUR, 3 * HOUR)
            .await
            .map(|_| ()),
    ];
    for result in results {
        assert!(
            matches!(
                result,
                Err(ManagerError::TerminalState {
                    state: OperationState::Succeeded,
                    ..
                })
            ),
            "{result:?}"
        );
    }

    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.state, OperationState::Succeeded);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn stale_snapshot_cannot_overturn_terminal_state() {
    let f = fixture().await;
    let _ = f.manager.fail(&f.operation, "first worker failed it").await;

    // Second worker still holds the version-0 InProgress snapshot.
    let err = f
        .manager
        .succeed(&f.operation, "second worker")
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            ManagerError::TerminalState {
                state: OperationState::Failed,
                ..
            }
        ),
        "{err}"
    );
    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.state, OperationState::Failed);
    assert_eq!(stored.description, "first worker failed it");
}

// ──────────────────────────────────────────────
// concurrent workers
// ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_succeed_calls_apply_once() {
    let f = fixture().await;
    let manager = Arc::new(f.manager);

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = Arc::clone(&manager);
        let snapshot = f.operation.clone();
        handles.push(tokio::spawn(async move {
            manager.succeed(&snapshot, &format!("worker-{i}")).await
        }));
    }

    for handle in handles {
        let transition = handle.await.unwrap().unwrap();
        assert_eq!(transition.operation.state, OperationState::Succeeded);
        assert_eq!(transition.delay, Duration::ZERO);
    }

    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.state, OperationState::Succeeded);
    assert_eq!(stored.version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_succeed_and_fail_one_wins_cleanly() {
    let f = fixture().await;
    let manager = Arc::new(f.manager);

    let succeed = {
        let manager = Arc::clone(&manager);
        let snapshot = f.operation.clone();
        tokio::spawn(async move { manager.succeed(&snapshot, "ok").await.map(|_| ()) })
    };
    let fail = {
        let manager = Arc::clone(&manager);
        let snapshot = f.operation.clone();
        tokio::spawn(async move { manager.fail(&snapshot, "broken").await.map(|_| ()) })
    };
    let succeed = succeed.await.unwrap();
    let fail = fail.await.unwrap();

    let stored = f.store.get(&f.operation.id).await.unwrap();
    assert_eq!(stored.version, 1);
    match stored.state {
        OperationState::Succeeded => {
            assert!(succeed.is_ok());
            assert!(matches!(fail, Err(ManagerError::TerminalState { .. })));
        }
        OperationState::Failed => {
            assert!(matches!(succeed, Err(ManagerError::TerminalState { .. })));
            assert!(matches!(fail, Err(ManagerError::OperationFailed { .. })));
        }
        other => panic!("unexpected state {other}"),
    }
}
