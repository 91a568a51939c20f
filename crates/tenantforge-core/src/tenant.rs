//! The per-tenant configuration record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::TenantId;
use crate::naming;
use crate::resource::{ConfigField, ResourceHandle, ResourceKind};

/// Default region used when none is configured.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Secrets for the external store integration.
///
/// Always created empty; a separate integration flow fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSecrets {
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub access_token: String,
}

/// One record per tenant: the single source of truth for which resources belong
/// to that tenant.
///
/// Teardown works exclusively from the contents of this record, never from
/// recomputed names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    pub namespace: String,
    pub product_collection: String,
    pub logs_collection: String,
    pub region: String,

    pub bucket_name: String,
    pub compute_environment_name: String,
    pub job_queue_name: String,
    pub job_definition_name: String,
    pub job_name: String,
    pub role_name: String,
    pub function_name: String,
    pub gateway_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,

    #[serde(default)]
    pub secrets: IntegrationSecrets,

    /// Handles of resources created by provisioning and not yet compensated.
    #[serde(default)]
    pub resources: BTreeMap<ResourceKind, ResourceHandle>,
}

impl TenantConfig {
    /// Builds the record with deterministic names for every resource.
    pub fn derive(tenant: &TenantId, region: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant.clone(),
            namespace: naming::namespace(tenant),
            product_collection: naming::product_collection(tenant),
            logs_collection: naming::logs_collection(tenant),
            region: region.into(),
            bucket_name: naming::bucket(tenant),
            compute_environment_name: naming::compute_environment(tenant),
            job_queue_name: naming::job_queue(tenant),
            job_definition_name: naming::job_definition(tenant),
            job_name: naming::job(tenant),
            role_name: naming::role(tenant),
            function_name: naming::function(tenant),
            gateway_name: naming::gateway(tenant),
            role_arn: None,
            function_arn: None,
            gateway_id: None,
            gateway_url: None,
            secrets: IntegrationSecrets::default(),
            resources: BTreeMap::new(),
        }
    }

    /// Collections created inside the tenant's data namespace.
    pub fn collections(&self) -> Vec<String> {
        vec![self.product_collection.clone(), self.logs_collection.clone()]
    }

    /// Reads a field; late-bound fields are `None` until their step has run.
    pub fn field(&self, field: ConfigField) -> Option<&str> {
        match field {
            ConfigField::Namespace => Some(&self.namespace),
            ConfigField::Region => Some(&self.region),
            ConfigField::BucketName => Some(&self.bucket_name),
            ConfigField::ComputeEnvironmentName => Some(&self.compute_environment_name),
            ConfigField::JobQueueName => Some(&self.job_queue_name),
            ConfigField::JobDefinitionName => Some(&self.job_definition_name),
            ConfigField::JobName => Some(&self.job_name),
            ConfigField::RoleName => Some(&self.role_name),
            ConfigField::FunctionName => Some(&self.function_name),
            ConfigField::GatewayName => Some(&self.gateway_name),
            ConfigField::RoleArn => self.role_arn.as_deref(),
            ConfigField::FunctionArn => self.function_arn.as_deref(),
            ConfigField::GatewayId => self.gateway_id.as_deref(),
            ConfigField::GatewayUrl => self.gateway_url.as_deref(),
        }
    }

    pub fn set_field(&mut self, field: ConfigField, value: impl Into<String>) {
        let value = value.into();
        match field {
            ConfigField::Namespace => self.namespace = value,
            ConfigField::Region => self.region = value,
            ConfigField::BucketName => self.bucket_name = value,
            ConfigField::ComputeEnvironmentName => self.compute_environment_name = value,
            ConfigField::JobQueueName => self.job_queue_name = value,
            ConfigField::JobDefinitionName => self.job_definition_name = value,
            ConfigField::JobName => self.job_name = value,
            ConfigField::RoleName => self.role_name = value,
            ConfigField::FunctionName => self.function_name = value,
            ConfigField::GatewayName => self.gateway_name = value,
            ConfigField::RoleArn => self.role_arn = Some(value),
            ConfigField::FunctionArn => self.function_arn = Some(value),
            ConfigField::GatewayId => self.gateway_id = Some(value),
            ConfigField::GatewayUrl => self.gateway_url = Some(value),
        }
    }

    /// Clears a late-bound field. Derived fields are left untouched.
    pub fn clear_field(&mut self, field: ConfigField) {
        match field {
            ConfigField::RoleArn => self.role_arn = None,
            ConfigField::FunctionArn => self.function_arn = None,
            ConfigField::GatewayId => self.gateway_id = None,
            ConfigField::GatewayUrl => self.gateway_url = None,
            _ => {}
        }
    }

    pub fn handle(&self, kind: ResourceKind) -> Option<&ResourceHandle> {
        self.resources.get(&kind)
    }

    /// Records `handle` for `kind`, returning the handle it replaces.
    pub fn record_handle(
        &mut self,
        kind: ResourceKind,
        handle: ResourceHandle,
    ) -> Option<ResourceHandle> {
        self.resources.insert(kind, handle)
    }

    /// Keeps what an earlier record knows that derivation cannot recompute:
    /// recorded handles, late-bound fields and integration secrets.
    pub fn carry_over(&mut self, previous: &TenantConfig) {
        for (kind, handle) in &previous.resources {
            self.resources.entry(*kind).or_insert_with(|| handle.clone());
        }
        for field in [
            ConfigField::RoleArn,
            ConfigField::FunctionArn,
            ConfigField::GatewayId,
            ConfigField::GatewayUrl,
        ] {
            if self.field(field).is_none()
                && let Some(value) = previous.field(field)
            {
                self.set_field(field, value);
            }
        }
        self.secrets = previous.secrets.clone();
    }

    pub fn forget_handle(&mut self, kind: ResourceKind) -> Option<ResourceHandle> {
        self.resources.remove(&kind)
    }
}
