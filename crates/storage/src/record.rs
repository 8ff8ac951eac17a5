use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lifecycle state of an operation.
///
/// `Succeeded` and `Failed` are absorbing: once stored, no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::InProgress => "in progress",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category of an operation. Each kind is an independent stream of
/// history for the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Provisioning,
    Deprovisioning,
    Upgrade,
    Suspension,
    Unsuspension,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Provisioning,
        OperationKind::Deprovisioning,
        OperationKind::Upgrade,
        OperationKind::Suspension,
        OperationKind::Unsuspension,
    ];

    /// Short name used in operator-facing labels, e.g. `failed (kyma upgrade)`.
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Provisioning => "provision",
            OperationKind::Deprovisioning => "deprovision",
            OperationKind::Upgrade => "kyma upgrade",
            OperationKind::Suspension => "suspension",
            OperationKind::Unsuspension => "unsuspension",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parameters the instance was provisioned with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningParameters {
    pub plan_id: String,
    pub service_id: String,
    pub global_account_id: String,
    pub sub_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// The runtime an orchestrated operation targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub runtime_id: String,
    pub sub_account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot_name: Option<String>,
}

/// One runtime's share of an orchestration (e.g. a fleet-wide upgrade).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOperation {
    pub runtime: Runtime,
    /// When set, steps compute what they would do but make no external calls.
    pub dry_run: bool,
}

/// Kind-specific payload. The variant is the operation's kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationDetails {
    Provisioning {
        parameters: ProvisioningParameters,
    },
    Deprovisioning {
        parameters: ProvisioningParameters,
    },
    Upgrade {
        runtime_operation: RuntimeOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        orchestration_id: Option<String>,
    },
    Suspension {},
    Unsuspension {
        parameters: ProvisioningParameters,
    },
}

impl OperationDetails {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationDetails::Provisioning { .. } => OperationKind::Provisioning,
            OperationDetails::Deprovisioning { .. } => OperationKind::Deprovisioning,
            OperationDetails::Upgrade { .. } => OperationKind::Upgrade,
            OperationDetails::Suspension {} => OperationKind::Suspension,
            OperationDetails::Unsuspension { .. } => OperationKind::Unsuspension,
        }
    }
}

/// A persisted record of one asynchronous lifecycle action against a
/// cluster instance.
///
/// `version` and `updated_at` are owned by the store: every successful
/// update increments the former and stamps the latter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub version: i64,
    pub instance_id: String,
    pub state: OperationState,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Correlation id in the external provisioner; empty until assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner_operation_id: Option<String>,
    #[serde(flatten)]
    pub details: OperationDetails,
}

impl Operation {
    /// A fresh `InProgress` operation at version 0 with a random id.
    pub fn new(
        instance_id: impl Into<String>,
        details: OperationDetails,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version: 0,
            instance_id: instance_id.into(),
            state: OperationState::InProgress,
            description: "Operation created".to_string(),
            created_at: now,
            updated_at: now,
            provisioner_operation_id: None,
            details,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.details.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
