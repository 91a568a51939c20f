//! Resource kinds, handles and the configuration fields steps read and write.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The cloud resources provisioned for every tenant.
///
/// Variants are declared in provisioning order; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Bucket,
    ComputeEnvironment,
    JobQueue,
    JobDefinition,
    ExecutionRole,
    Function,
    Gateway,
}

impl ResourceKind {
    /// All kinds in provisioning order.
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Bucket,
        ResourceKind::ComputeEnvironment,
        ResourceKind::JobQueue,
        ResourceKind::JobDefinition,
        ResourceKind::ExecutionRole,
        ResourceKind::Function,
        ResourceKind::Gateway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::ComputeEnvironment => "compute_environment",
            Self::JobQueue => "job_queue",
            Self::JobDefinition => "job_definition",
            Self::ExecutionRole => "execution_role",
            Self::Function => "function",
            Self::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier returned by a provider's create call (ARN, ID or name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Addressable fields of a [`TenantConfig`](crate::TenantConfig).
///
/// Provisioning steps declare the fields they read and write in terms of this
/// enum so the plan stays pure data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    Namespace,
    Region,
    BucketName,
    ComputeEnvironmentName,
    JobQueueName,
    JobDefinitionName,
    JobName,
    RoleName,
    FunctionName,
    GatewayName,
    RoleArn,
    FunctionArn,
    GatewayId,
    GatewayUrl,
}

impl ConfigField {
    /// Whether the field is produced by a provisioning step rather than derived
    /// from the tenant identifier.
    pub fn is_late_bound(&self) -> bool {
        matches!(
            self,
            Self::RoleArn | Self::FunctionArn | Self::GatewayId | Self::GatewayUrl
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Region => "region",
            Self::BucketName => "bucket_name",
            Self::ComputeEnvironmentName => "compute_environment_name",
            Self::JobQueueName => "job_queue_name",
            Self::JobDefinitionName => "job_definition_name",
            Self::JobName => "job_name",
            Self::RoleName => "role_name",
            Self::FunctionName => "function_name",
            Self::GatewayName => "gateway_name",
            Self::RoleArn => "role_arn",
            Self::FunctionArn => "function_arn",
            Self::GatewayId => "gateway_id",
            Self::GatewayUrl => "gateway_url",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
