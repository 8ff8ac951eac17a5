//! Conformance test suite for `OperationStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `OperationStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Insert**: record creation, duplicate detection
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Concurrency**: real task races against the version check
//! - **History**: per-instance, per-kind listing in newest-first order
//! - **Error handling**: correct error variants for invalid operations
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use lifecycle_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod history;
mod insert;
mod version;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::record::{Operation, OperationDetails, OperationState, ProvisioningParameters};
use crate::OperationStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "insert", "version", "concurrent").
    pub category: String,
    /// Test name (e.g. "insert_then_get_returns_same_record").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: OperationStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(insert::run_insert_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const BASE_TIME: OffsetDateTime = datetime!(2025-01-01 0:00 UTC);

fn parameters() -> ProvisioningParameters {
    ProvisioningParameters {
        plan_id: "plan-azure".to_string(),
        service_id: "kyma".to_string(),
        global_account_id: "ga-1".to_string(),
        sub_account_id: "sa-1".to_string(),
        region: Some("westeurope".to_string()),
    }
}

/// An `InProgress` provisioning operation at version 0.
fn make_operation(id: &str, instance_id: &str) -> Operation {
    make_operation_with(
        id,
        instance_id,
        OperationDetails::Provisioning {
            parameters: parameters(),
        },
        0,
    )
}

/// An operation of the given kind created `minutes_after_base` after the base time.
fn make_operation_with(
    id: &str,
    instance_id: &str,
    details: OperationDetails,
    minutes_after_base: i64,
) -> Operation {
    let created = BASE_TIME + Duration::minutes(minutes_after_base);
    Operation {
        id: id.to_string(),
        version: 0,
        instance_id: instance_id.to_string(),
        state: OperationState::InProgress,
        description: "operation created".to_string(),
        created_at: created,
        updated_at: created,
        provisioner_operation_id: None,
        details,
    }
}

/// Insert a fresh operation and return it as stored.
async fn seed<S: OperationStore>(s: &S, id: &str) -> Result<Operation, String> {
    let op = make_operation(id, "instance-1");
    s.insert(&op).await.map_err(|e| format!("insert {id}: {e}"))?;
    Ok(op)
}
