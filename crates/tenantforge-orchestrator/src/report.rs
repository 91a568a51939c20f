//! Results returned by provisioning and teardown.

use serde::Serialize;
use tenantforge_core::{ProvisionError, ResourceKind, TenantConfig, TenantId};

/// A fully provisioned tenant.
#[derive(Debug, Clone, Serialize)]
pub struct Provisioned {
    pub config: TenantConfig,
    pub gateway_url: Option<String>,
    /// Resources from an earlier record that this run replaced and deleted.
    pub replaced: Vec<CompensationOutcome>,
}

/// Result of undoing one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum CompensationStatus {
    Deleted,
    AlreadyAbsent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationOutcome {
    pub kind: ResourceKind,
    pub handle: String,
    #[serde(flatten)]
    pub status: CompensationStatus,
}

impl CompensationOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, CompensationStatus::Failed(_))
    }
}

/// A provisioning run that did not complete.
///
/// `compensations` lists the undo calls in the order they ran.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{cause}")]
pub struct ProvisionFailure {
    pub cause: ProvisionError,
    pub failed_step: Option<ResourceKind>,
    pub compensations: Vec<CompensationOutcome>,
    /// Record, namespace or directory cleanup that did not succeed.
    pub cleanup_errors: Vec<String>,
}

impl ProvisionFailure {
    /// A failure raised before anything was created.
    pub fn before_start(cause: ProvisionError) -> Self {
        Self {
            cause,
            failed_step: None,
            compensations: Vec::new(),
            cleanup_errors: Vec::new(),
        }
    }

    /// Every compensation and cleanup succeeded.
    pub fn fully_compensated(&self) -> bool {
        self.cleanup_errors.is_empty() && self.compensations.iter().all(CompensationOutcome::succeeded)
    }

    /// Compensation failures as `ProviderDeleteFailed` errors.
    pub fn compensation_errors(&self) -> Vec<ProvisionError> {
        self.compensations
            .iter()
            .filter_map(|outcome| match &outcome.status {
                CompensationStatus::Failed(message) => Some(ProvisionError::delete_failed(
                    outcome.kind,
                    &outcome.handle,
                    message,
                )),
                _ => None,
            })
            .collect()
    }
}

/// Result of one teardown deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DeletionStatus {
    Deleted,
    AlreadyAbsent,
    /// The record names no resource of this kind.
    NotRecorded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub kind: ResourceKind,
    pub handle: Option<String>,
    #[serde(flatten)]
    pub status: DeletionStatus,
}

/// Outcomes for every resource kind, in teardown order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub tenant: TenantId,
    pub deletions: Vec<DeletionOutcome>,
    pub cleanup_errors: Vec<String>,
}

impl TeardownReport {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            deletions: Vec::new(),
            cleanup_errors: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: ResourceKind, handle: Option<String>, status: DeletionStatus) {
        self.deletions.push(DeletionOutcome { kind, handle, status });
    }

    pub fn is_complete(&self) -> bool {
        self.cleanup_errors.is_empty() && self.failures().is_empty()
    }

    pub fn failures(&self) -> Vec<ProvisionError> {
        self.deletions
            .iter()
            .filter_map(|outcome| match &outcome.status {
                DeletionStatus::Failed(message) => Some(ProvisionError::delete_failed(
                    outcome.kind,
                    outcome.handle.clone().unwrap_or_default(),
                    message,
                )),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, kind: ResourceKind) -> Option<&DeletionStatus> {
        self.deletions
            .iter()
            .find(|outcome| outcome.kind == kind)
            .map(|outcome| &outcome.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownOutcome {
    /// No record exists; nothing was touched.
    NotFound,
    Completed(TeardownReport),
}
