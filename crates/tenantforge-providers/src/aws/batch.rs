//! Compute environment, job queue and job definition on the batch service.

use async_trait::async_trait;
use aws_sdk_batch::types::{
    AssignPublicIp, CeState, CeType, ComputeEnvironmentOrder, ComputeResource, ContainerProperties,
    CrType, JobDefinitionType, JqState, NetworkConfiguration, PlatformCapability,
    ResourceRequirement, ResourceType,
};
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};
use tracing::{info, warn};

use super::classify::{ErrorClass, classify, sdk_result};
use super::{ComputeSettings, JobSettings};
use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{CreateRequest, Created, Deleted, Lifecycle, ResourceState};

/// Maps a batch status string onto a resource state.
fn state_from_status(status: Option<&str>, reason: Option<&str>) -> ResourceState {
    match status {
        Some("VALID") => ResourceState::Ready,
        Some("CREATING") | Some("UPDATING") | None => ResourceState::Pending,
        Some("DELETING") => ResourceState::Deleting,
        Some("DELETED") => ResourceState::NotFound,
        Some("INVALID") => ResourceState::Failed(reason.unwrap_or("invalid").to_string()),
        Some(other) => ResourceState::Failed(format!("unexpected status {other}")),
    }
}

/// Turns an "already exists" create error into a reused handle.
fn created_or_reused<T, E, R>(
    result: Result<T, aws_sdk_batch::error::SdkError<E, R>>,
    name: &str,
    operation: &str,
) -> Result<Created, ProviderError>
where
    E: aws_sdk_batch::error::ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match result {
        Ok(_) => Ok(Created::new(name)),
        Err(err) => {
            let classified = classify(&err);
            if classified.class == ErrorClass::AlreadyOwned {
                Ok(Created::reused(name))
            } else {
                Err(classified.into_provider_error(operation))
            }
        }
    }
}

/// Managed Fargate compute environment.
#[derive(Debug, Clone)]
pub struct ComputeEnvironmentProvider {
    client: aws_sdk_batch::Client,
    settings: ComputeSettings,
}

impl ComputeEnvironmentProvider {
    pub fn new(client: aws_sdk_batch::Client, settings: ComputeSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ResourceProvider for ComputeEnvironmentProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeEnvironment
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Async
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::ComputeEnvironmentName)?;
        let resources = ComputeResource::builder()
            .r#type(CrType::from("FARGATE"))
            .maxv_cpus(self.settings.max_vcpus)
            .set_subnets(Some(self.settings.subnets.clone()))
            .set_security_group_ids(Some(self.settings.security_group_ids.clone()))
            .build();

        let created = created_or_reused(
            self.client
                .create_compute_environment()
                .compute_environment_name(name)
                .r#type(CeType::from("MANAGED"))
                .state(CeState::from("ENABLED"))
                .compute_resources(resources)
                .send()
                .await,
            name,
            "CreateComputeEnvironment",
        )?;
        info!(name, reused = created.reused, "Compute environment requested");
        Ok(created)
    }

    async fn prepare_delete(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        if self.describe(handle).await? == ResourceState::NotFound {
            return Ok(());
        }
        sdk_result(
            self.client
                .update_compute_environment()
                .compute_environment(handle.as_str())
                .state(CeState::from("DISABLED"))
                .send()
                .await,
            "UpdateComputeEnvironment",
        )?;
        info!(name = %handle, "Compute environment disabled");
        Ok(())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        if self.describe(handle).await? == ResourceState::NotFound {
            return Ok(Deleted::AlreadyAbsent);
        }
        match self
            .client
            .delete_compute_environment()
            .compute_environment(handle.as_str())
            .send()
            .await
        {
            Ok(_) => {
                info!(name = %handle, "Compute environment deletion started");
                Ok(Deleted::Removed)
            }
            Err(err) => {
                let classified = classify(&err);
                if classified.is_not_found() {
                    Ok(Deleted::AlreadyAbsent)
                } else {
                    Err(classified.into_provider_error("DeleteComputeEnvironment"))
                }
            }
        }
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let output = sdk_result(
            self.client
                .describe_compute_environments()
                .compute_environments(handle.as_str())
                .send()
                .await,
            "DescribeComputeEnvironments",
        )?;
        Ok(match output.compute_environments().first() {
            Some(detail) => state_from_status(
                detail.status().map(|s| s.as_str()),
                detail.status_reason(),
            ),
            None => ResourceState::NotFound,
        })
    }
}

/// Job queue attached to the tenant's compute environment.
#[derive(Debug, Clone)]
pub struct JobQueueProvider {
    client: aws_sdk_batch::Client,
}

impl JobQueueProvider {
    pub fn new(client: aws_sdk_batch::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceProvider for JobQueueProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::JobQueue
    }

    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::Async
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::JobQueueName)?;
        let environment = request.input(ConfigField::ComputeEnvironmentName)?;
        let order = ComputeEnvironmentOrder::builder()
            .order(1)
            .compute_environment(environment)
            .build();

        let created = created_or_reused(
            self.client
                .create_job_queue()
                .job_queue_name(name)
                .priority(1)
                .state(JqState::from("ENABLED"))
                .compute_environment_order(order)
                .send()
                .await,
            name,
            "CreateJobQueue",
        )?;
        info!(name, environment, reused = created.reused, "Job queue requested");
        Ok(created)
    }

    async fn prepare_delete(&self, handle: &ResourceHandle) -> Result<(), ProviderError> {
        if self.describe(handle).await? == ResourceState::NotFound {
            return Ok(());
        }
        sdk_result(
            self.client
                .update_job_queue()
                .job_queue(handle.as_str())
                .state(JqState::from("DISABLED"))
                .send()
                .await,
            "UpdateJobQueue",
        )?;
        info!(name = %handle, "Job queue disabled");
        Ok(())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        if self.describe(handle).await? == ResourceState::NotFound {
            return Ok(Deleted::AlreadyAbsent);
        }
        match self
            .client
            .delete_job_queue()
            .job_queue(handle.as_str())
            .send()
            .await
        {
            Ok(_) => {
                info!(name = %handle, "Job queue deletion started");
                Ok(Deleted::Removed)
            }
            Err(err) => {
                let classified = classify(&err);
                if classified.is_not_found() {
                    Ok(Deleted::AlreadyAbsent)
                } else {
                    Err(classified.into_provider_error("DeleteJobQueue"))
                }
            }
        }
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let output = sdk_result(
            self.client
                .describe_job_queues()
                .job_queues(handle.as_str())
                .send()
                .await,
            "DescribeJobQueues",
        )?;
        Ok(match output.job_queues().first() {
            Some(detail) => state_from_status(
                detail.status().map(|s| s.as_str()),
                detail.status_reason(),
            ),
            None => ResourceState::NotFound,
        })
    }
}

/// Fargate container job definition. Every registration adds a revision;
/// deletion deregisters all active revisions.
#[derive(Debug, Clone)]
pub struct JobDefinitionProvider {
    client: aws_sdk_batch::Client,
    settings: JobSettings,
}

impl JobDefinitionProvider {
    pub fn new(client: aws_sdk_batch::Client, settings: JobSettings) -> Self {
        Self { client, settings }
    }

    fn container_properties(&self) -> Result<ContainerProperties, ProviderError> {
        let vcpu = ResourceRequirement::builder()
            .r#type(ResourceType::from("VCPU"))
            .value(&self.settings.vcpus)
            .build();
        let memory = ResourceRequirement::builder()
            .r#type(ResourceType::from("MEMORY"))
            .value(&self.settings.memory_mib)
            .build();

        Ok(ContainerProperties::builder()
            .image(&self.settings.image)
            .set_command(Some(self.settings.command.clone()))
            .execution_role_arn(&self.settings.execution_role_arn)
            .network_configuration(
                NetworkConfiguration::builder()
                    .assign_public_ip(AssignPublicIp::from("ENABLED"))
                    .build(),
            )
            .resource_requirements(vcpu)
            .resource_requirements(memory)
            .build())
    }

    /// ARNs of every active revision registered under `name`.
    async fn active_revisions(&self, name: &str) -> Result<Vec<String>, ProviderError> {
        let mut pages = self
            .client
            .describe_job_definitions()
            .job_definition_name(name)
            .status("ACTIVE")
            .into_paginator()
            .send();
        let mut arns = Vec::new();
        while let Some(page) = pages.next().await {
            let page = sdk_result(page, "DescribeJobDefinitions")?;
            for definition in page.job_definitions() {
                let arn: Option<&str> = definition.job_definition_arn().into();
                if let Some(arn) = arn {
                    arns.push(arn.to_string());
                }
            }
        }
        Ok(arns)
    }
}

#[async_trait]
impl ResourceProvider for JobDefinitionProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::JobDefinition
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::JobDefinitionName)?;
        sdk_result(
            self.client
                .register_job_definition()
                .job_definition_name(name)
                .r#type(JobDefinitionType::from("container"))
                .platform_capabilities(PlatformCapability::from("FARGATE"))
                .container_properties(self.container_properties()?)
                .send()
                .await,
            "RegisterJobDefinition",
        )?;
        info!(name, "Job definition registered");
        Ok(Created::new(name))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        let revisions = self.active_revisions(handle.as_str()).await?;
        if revisions.is_empty() {
            return Ok(Deleted::AlreadyAbsent);
        }

        let mut failures = Vec::new();
        for arn in &revisions {
            if let Err(err) = sdk_result(
                self.client
                    .deregister_job_definition()
                    .job_definition(arn)
                    .send()
                    .await,
                "DeregisterJobDefinition",
            ) {
                warn!(revision = %arn, error = %err, "Failed to deregister revision");
                failures.push(format!("{arn}: {}", err.message));
            }
        }

        if !failures.is_empty() {
            return Err(ProviderError::rejected(format!(
                "{} of {} revisions not deregistered: {}",
                failures.len(),
                revisions.len(),
                failures.join("; ")
            )));
        }
        info!(name = %handle, revisions = revisions.len(), "Job definition deregistered");
        Ok(Deleted::Removed)
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let revisions = self.active_revisions(handle.as_str()).await?;
        Ok(if revisions.is_empty() {
            ResourceState::NotFound
        } else {
            ResourceState::Ready
        })
    }
}
