//! The provisioning plan: pure data describing each step.
//!
//! Steps never call providers themselves. The engine reads the fields a step
//! declares, hands them to the provider registered for the step's kind and
//! writes the declared outputs back into the tenant's record.

use std::collections::BTreeSet;

use tenantforge_core::{ConfigField, ResourceKind};
use thiserror::Error;

/// One unit of forward work and its compensation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningStep {
    pub kind: ResourceKind,
    /// Record fields passed to the provider's `create`.
    pub reads: &'static [ConfigField],
    /// Late-bound record fields the step fills in.
    pub writes: &'static [ConfigField],
    /// Field naming the resource when no handle was recorded.
    pub compensation_reads: ConfigField,
    /// Block until the provider reports the resource ready.
    pub awaits_ready: bool,
}

impl ProvisioningStep {
    pub const fn new(
        kind: ResourceKind,
        reads: &'static [ConfigField],
        writes: &'static [ConfigField],
        compensation_reads: ConfigField,
    ) -> Self {
        Self {
            kind,
            reads,
            writes,
            compensation_reads,
            awaits_ready: false,
        }
    }

    #[must_use]
    pub const fn awaiting_ready(mut self) -> Self {
        self.awaits_ready = true;
        self
    }
}

/// Ways a plan can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("step {kind} appears more than once")]
    DuplicateStep { kind: ResourceKind },

    #[error("step {kind} reads '{field}' before any earlier step writes it")]
    UnboundInput {
        kind: ResourceKind,
        field: ConfigField,
    },

    #[error("step {kind} writes derived field '{field}'")]
    DerivedOutput {
        kind: ResourceKind,
        field: ConfigField,
    },

    #[error("step {kind} compensates using '{field}', which is not available to it")]
    UnboundCompensation {
        kind: ResourceKind,
        field: ConfigField,
    },
}

/// Ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    steps: Vec<ProvisioningStep>,
}

impl ProvisioningPlan {
    pub fn new(steps: Vec<ProvisioningStep>) -> Self {
        Self { steps }
    }

    /// Bucket, compute environment, job queue, job definition, execution role,
    /// function, gateway.
    pub fn standard() -> Self {
        use ConfigField as F;
        use ResourceKind as K;

        Self::new(vec![
            ProvisioningStep::new(K::Bucket, &[F::BucketName, F::Region], &[], F::BucketName),
            ProvisioningStep::new(
                K::ComputeEnvironment,
                &[F::ComputeEnvironmentName],
                &[],
                F::ComputeEnvironmentName,
            )
            .awaiting_ready(),
            ProvisioningStep::new(
                K::JobQueue,
                &[F::JobQueueName, F::ComputeEnvironmentName],
                &[],
                F::JobQueueName,
            )
            .awaiting_ready(),
            ProvisioningStep::new(
                K::JobDefinition,
                &[F::JobDefinitionName],
                &[],
                F::JobDefinitionName,
            ),
            ProvisioningStep::new(K::ExecutionRole, &[F::RoleName], &[F::RoleArn], F::RoleName),
            ProvisioningStep::new(
                K::Function,
                &[
                    F::FunctionName,
                    F::RoleArn,
                    F::JobQueueName,
                    F::JobDefinitionName,
                    F::JobName,
                ],
                &[F::FunctionArn],
                F::FunctionName,
            ),
            ProvisioningStep::new(
                K::Gateway,
                &[F::GatewayName, F::Region, F::FunctionArn],
                &[F::GatewayId, F::GatewayUrl],
                F::GatewayId,
            ),
        ])
    }

    pub fn steps(&self) -> &[ProvisioningStep] {
        &self.steps
    }

    pub fn step(&self, kind: ResourceKind) -> Option<&ProvisioningStep> {
        self.steps.iter().find(|step| step.kind == kind)
    }

    /// Checks that every input is derived or written by an earlier step, and
    /// that every compensation only needs fields present once its step ran.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = BTreeSet::new();
        let mut bound = BTreeSet::new();
        let available = |field: ConfigField, bound: &BTreeSet<ConfigField>| {
            !field.is_late_bound() || bound.contains(&field)
        };

        for step in &self.steps {
            if !seen.insert(step.kind) {
                return Err(PlanError::DuplicateStep { kind: step.kind });
            }
            if let Some(field) = step.reads.iter().find(|f| !available(**f, &bound)) {
                return Err(PlanError::UnboundInput {
                    kind: step.kind,
                    field: *field,
                });
            }
            if let Some(field) = step.writes.iter().find(|f| !f.is_late_bound()) {
                return Err(PlanError::DerivedOutput {
                    kind: step.kind,
                    field: *field,
                });
            }
            bound.extend(step.writes.iter().copied());
            if !available(step.compensation_reads, &bound) {
                return Err(PlanError::UnboundCompensation {
                    kind: step.kind,
                    field: step.compensation_reads,
                });
            }
        }
        Ok(())
    }
}

impl Default for ProvisioningPlan {
    fn default() -> Self {
        Self::standard()
    }
}
