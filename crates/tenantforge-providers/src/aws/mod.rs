//! AWS implementations of the seven resource providers.

mod batch;
mod bucket;
pub(crate) mod classify;
mod function;
mod gateway;
mod role;

use std::sync::Arc;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderSet;

pub use batch::{ComputeEnvironmentProvider, JobDefinitionProvider, JobQueueProvider};
pub use bucket::BucketProvider;
pub use function::FunctionProvider;
pub use gateway::GatewayProvider;
pub use role::ExecutionRoleProvider;

/// Public-access options applied to a freshly created bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketSettings {
    /// Turn off the public access block.
    pub allow_public_access: bool,
    /// Enable ACLs through `ObjectWriter` ownership.
    pub enable_acl: bool,
    /// Apply the `public-read` canned ACL (implies ACLs enabled).
    pub allow_object_read: bool,
    /// Attach a policy granting public `s3:GetObject` on every object.
    pub public_read_policy: bool,
}

impl Default for BucketSettings {
    fn default() -> Self {
        Self {
            allow_public_access: true,
            enable_acl: true,
            allow_object_read: true,
            public_read_policy: true,
        }
    }
}

/// Fargate compute environment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeSettings {
    pub subnets: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub max_vcpus: i32,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            subnets: Vec::new(),
            security_group_ids: Vec::new(),
            max_vcpus: 1,
        }
    }
}

/// Container job definition parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub image: String,
    pub command: Vec<String>,
    pub execution_role_arn: String,
    pub vcpus: String,
    pub memory_mib: String,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            image: String::new(),
            command: vec!["python".into(), "post_product.py".into()],
            execution_role_arn: String::new(),
            vcpus: "1.0".into(),
            memory_mib: "2048".into(),
        }
    }
}

/// Function packaging and execution-role parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSettings {
    pub runtime: String,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    /// Pause after creating a role so it can be assumed by the function service.
    pub role_propagation_delay_secs: u64,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            runtime: "python3.13".into(),
            timeout_secs: 30,
            memory_mb: 128,
            role_propagation_delay_secs: 10,
        }
    }
}

impl FunctionSettings {
    pub fn role_propagation_delay(&self) -> Duration {
        Duration::from_secs(self.role_propagation_delay_secs)
    }
}

/// Everything the AWS adapters need beyond what the tenant record carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub region: String,
    /// Override for every service endpoint (e.g. a local emulator).
    pub endpoint_url: Option<String>,
    pub stage: String,
    pub bucket: BucketSettings,
    pub compute: ComputeSettings,
    pub job: JobSettings,
    pub function: FunctionSettings,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: tenantforge_core::DEFAULT_REGION.into(),
            endpoint_url: None,
            stage: "prod".into(),
            bucket: BucketSettings::default(),
            compute: ComputeSettings::default(),
            job: JobSettings::default(),
            function: FunctionSettings::default(),
        }
    }
}

impl AwsSettings {
    /// Checks the settings that have no usable default.
    pub fn validate(&self) -> Result<(), String> {
        if self.region.trim().is_empty() {
            return Err("aws.region must not be empty".into());
        }
        if self.compute.subnets.is_empty() {
            return Err("aws.compute.subnets must list at least one subnet".into());
        }
        if self.compute.max_vcpus <= 0 {
            return Err("aws.compute.max_vcpus must be positive".into());
        }
        if self.job.image.trim().is_empty() {
            return Err("aws.job.image must not be empty".into());
        }
        if self.job.execution_role_arn.trim().is_empty() {
            return Err("aws.job.execution_role_arn must not be empty".into());
        }
        if self.stage.trim().is_empty() {
            return Err("aws.stage must not be empty".into());
        }
        Ok(())
    }
}

/// Service clients shared by the adapters.
#[derive(Debug, Clone)]
pub struct AwsClients {
    pub s3: aws_sdk_s3::Client,
    pub batch: aws_sdk_batch::Client,
    pub lambda: aws_sdk_lambda::Client,
    pub iam: aws_sdk_iam::Client,
    pub apigateway: aws_sdk_apigateway::Client,
}

impl AwsClients {
    /// Loads credentials from the default chain for the configured region.
    pub async fn load(settings: &AwsSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(url) = &settings.endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let shared = loader.load().await;
        Self::from_shared(&shared, settings.endpoint_url.is_some())
    }

    /// Builds every client from one shared config. Emulators generally need
    /// path-style bucket addressing.
    pub fn from_shared(shared: &SdkConfig, path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(shared)
            .force_path_style(path_style)
            .build();
        Self {
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            batch: aws_sdk_batch::Client::new(shared),
            lambda: aws_sdk_lambda::Client::new(shared),
            iam: aws_sdk_iam::Client::new(shared),
            apigateway: aws_sdk_apigateway::Client::new(shared),
        }
    }
}

/// Builds the full provider set backed by AWS.
pub fn providers(clients: &AwsClients, settings: &AwsSettings) -> ProviderSet {
    ProviderSet::new()
        .with(Arc::new(BucketProvider::new(
            clients.s3.clone(),
            settings.bucket.clone(),
        )))
        .with(Arc::new(ComputeEnvironmentProvider::new(
            clients.batch.clone(),
            settings.compute.clone(),
        )))
        .with(Arc::new(JobQueueProvider::new(clients.batch.clone())))
        .with(Arc::new(JobDefinitionProvider::new(
            clients.batch.clone(),
            settings.job.clone(),
        )))
        .with(Arc::new(ExecutionRoleProvider::new(
            clients.iam.clone(),
            settings.function.role_propagation_delay(),
        )))
        .with(Arc::new(FunctionProvider::new(
            clients.lambda.clone(),
            settings.function.clone(),
        )))
        .with(Arc::new(GatewayProvider::new(
            clients.apigateway.clone(),
            clients.lambda.clone(),
            settings.stage.clone(),
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AwsSettings {
        let mut settings = AwsSettings::default();
        settings.compute.subnets = vec!["subnet-1".into()];
        settings.job.image = "registry/shopify:latest".into();
        settings.job.execution_role_arn = "arn:aws:iam::123456789012:role/BatchExec".into();
        settings
    }

    #[test]
    fn defaults() {
        let settings = AwsSettings::default();
        assert_eq!(settings.region, "ap-south-1");
        assert_eq!(settings.stage, "prod");
        assert_eq!(settings.compute.max_vcpus, 1);
        assert_eq!(settings.job.command, vec!["python", "post_product.py"]);
        assert_eq!(settings.function.runtime, "python3.13");
        assert!(settings.bucket.allow_public_access);
    }

    #[test]
    fn validation() {
        assert!(complete().validate().is_ok());
        assert!(AwsSettings::default().validate().is_err());

        let mut settings = complete();
        settings.compute.max_vcpus = 0;
        assert!(settings.validate().unwrap_err().contains("max_vcpus"));

        let mut settings = complete();
        settings.job.execution_role_arn.clear();
        assert!(settings.validate().unwrap_err().contains("execution_role_arn"));
    }
}
