//! Request and result types shared by every provider.

use std::collections::BTreeMap;

use tenantforge_core::{ConfigField, ResourceHandle, TenantId};

use crate::error::ProviderError;

/// Whether a resource is usable as soon as `create` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Immediate,
    /// State transitions happen after the call returns and must be polled.
    Async,
}

/// Input to a provider's `create` call: the config fields the step reads.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub tenant: TenantId,
    pub inputs: BTreeMap<ConfigField, String>,
}

impl CreateRequest {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            inputs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_input(mut self, field: ConfigField, value: impl Into<String>) -> Self {
        self.inputs.insert(field, value.into());
        self
    }

    /// Returns a required input, failing the call if the step did not supply it.
    pub fn input(&self, field: ConfigField) -> Result<&str, ProviderError> {
        self.inputs
            .get(&field)
            .map(String::as_str)
            .ok_or_else(|| ProviderError::rejected(format!("missing input field '{field}'")))
    }
}

/// Successful result of a `create` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub handle: ResourceHandle,
    /// Late-bound values to write back into the tenant's record.
    pub outputs: BTreeMap<ConfigField, String>,
    /// The resource already existed and is owned by this workflow.
    pub reused: bool,
}

impl Created {
    pub fn new(handle: impl Into<ResourceHandle>) -> Self {
        Self {
            handle: handle.into(),
            outputs: BTreeMap::new(),
            reused: false,
        }
    }

    pub fn reused(handle: impl Into<ResourceHandle>) -> Self {
        Self {
            reused: true,
            ..Self::new(handle)
        }
    }

    #[must_use]
    pub fn with_output(mut self, field: ConfigField, value: impl Into<String>) -> Self {
        self.outputs.insert(field, value.into());
        self
    }
}

/// Successful result of a `delete` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Removed,
    /// Nothing to delete; counts as success.
    AlreadyAbsent,
}

/// Observed state of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Being created or updated.
    Pending,
    /// Settled and usable (or settled after being disabled).
    Ready,
    Deleting,
    Failed(String),
    NotFound,
}

/// States the orchestrator waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Ready,
    Gone,
}

impl ResourceState {
    #[must_use]
    pub fn satisfies(&self, target: TargetState) -> bool {
        matches!(
            (self, target),
            (Self::Ready, TargetState::Ready) | (Self::NotFound, TargetState::Gone)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_rejected() {
        let tenant = TenantId::parse("acme1").unwrap();
        let request =
            CreateRequest::new(tenant).with_input(ConfigField::BucketName, "acme1-bucket");
        assert_eq!(request.input(ConfigField::BucketName).unwrap(), "acme1-bucket");
        let err = request.input(ConfigField::RoleArn).unwrap_err();
        assert!(err.message.contains("role_arn"));
    }

    #[test]
    fn state_targets() {
        assert!(ResourceState::Ready.satisfies(TargetState::Ready));
        assert!(ResourceState::NotFound.satisfies(TargetState::Gone));
        assert!(!ResourceState::Deleting.satisfies(TargetState::Gone));
        assert!(!ResourceState::Pending.satisfies(TargetState::Ready));
    }

    #[test]
    fn created_builders() {
        let created = Created::reused("acme1_shopify_role")
            .with_output(ConfigField::RoleArn, "arn:aws:iam::1:role/acme1_shopify_role");
        assert!(created.reused);
        assert_eq!(created.handle.as_str(), "acme1_shopify_role");
        assert_eq!(created.outputs.len(), 1);
    }
}
