//! # tenantforge-orchestrator
//!
//! Saga-style provisioning for tenant topologies.
//!
//! [`Orchestrator::provision`] walks the [`ProvisioningPlan`] forward and, if a
//! step fails, deletes what earlier steps created in reverse order before
//! reporting the failure. [`Orchestrator::deprovision`] deletes everything the
//! tenant's record names, tolerating resources that are already gone.

mod engine;
mod plan;
mod report;
mod settings;

pub use engine::Orchestrator;
pub use plan::{PlanError, ProvisioningPlan, ProvisioningStep};
pub use report::{
    CompensationOutcome, CompensationStatus, DeletionOutcome, DeletionStatus, ProvisionFailure,
    Provisioned, TeardownOutcome, TeardownReport,
};
pub use settings::{OrchestratorSettings, RetryPolicy};
