use std::time::Duration;

use async_trait::async_trait;
use tenantforge_core::naming::role_policy;
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};
use tracing::{info, warn};

use super::classify::{ErrorClass, classify, sdk_optional, sdk_result};
use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{CreateRequest, Created, Deleted, ResourceState};

const ROLE_DESCRIPTION: &str = "Role for the tenant function to submit batch jobs";

fn trust_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": "lambda.amazonaws.com" },
            "Action": "sts:AssumeRole",
        }]
    })
    .to_string()
}

fn permissions_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Action": ["batch:SubmitJob", "batch:DescribeJobs", "batch:TerminateJob"],
                "Resource": "*",
            },
            {
                "Effect": "Allow",
                "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                "Resource": "arn:aws:logs:*:*:*",
            }
        ]
    })
    .to_string()
}

/// Execution role assumed by the tenant's function.
#[derive(Debug, Clone)]
pub struct ExecutionRoleProvider {
    client: aws_sdk_iam::Client,
    propagation_delay: Duration,
}

impl ExecutionRoleProvider {
    pub fn new(client: aws_sdk_iam::Client, propagation_delay: Duration) -> Self {
        Self {
            client,
            propagation_delay,
        }
    }

    async fn existing_arn(&self, name: &str) -> Result<String, ProviderError> {
        let output = sdk_result(
            self.client.get_role().role_name(name).send().await,
            "GetRole",
        )?;
        output
            .role()
            .and_then(|role| Option::<&str>::from(role.arn()))
            .map(str::to_string)
            .ok_or_else(|| ProviderError::rejected(format!("role '{name}' has no ARN")))
    }

    async fn remove_role(&self, name: &str) -> Result<Option<()>, ProviderError> {
        sdk_optional(
            self.client
                .delete_role_policy()
                .role_name(name)
                .policy_name(role_policy(name))
                .send()
                .await,
            "DeleteRolePolicy",
        )?;
        Ok(sdk_optional(
            self.client.delete_role().role_name(name).send().await,
            "DeleteRole",
        )?
        .map(|_| ()))
    }
}

#[async_trait]
impl ResourceProvider for ExecutionRoleProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ExecutionRole
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::RoleName)?;

        let created = self
            .client
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy())
            .description(ROLE_DESCRIPTION)
            .send()
            .await;

        let (arn, reused) = match created {
            Ok(output) => {
                let arn = output
                    .role()
                    .and_then(|role| Option::<&str>::from(role.arn()))
                    .map(str::to_string);
                match arn {
                    Some(arn) => (arn, false),
                    None => (self.existing_arn(name).await?, false),
                }
            }
            Err(err) => {
                let classified = classify(&err);
                if classified.class != ErrorClass::AlreadyOwned {
                    return Err(classified.into_provider_error("CreateRole"));
                }
                info!(role = name, "Role already exists, reusing it");
                (self.existing_arn(name).await?, true)
            }
        };

        let policy = sdk_result(
            self.client
                .put_role_policy()
                .role_name(name)
                .policy_name(role_policy(name))
                .policy_document(permissions_policy())
                .send()
                .await,
            "PutRolePolicy",
        );
        if let Err(err) = policy {
            if !reused {
                warn!(role = name, error = %err, "Policy attachment failed, removing new role");
                if let Err(cleanup) = self.remove_role(name).await {
                    warn!(role = name, error = %cleanup, "Failed to remove partially created role");
                    return Err(err.with_orphan(name));
                }
            }
            return Err(err);
        }

        if !reused && !self.propagation_delay.is_zero() {
            info!(
                role = name,
                delay_secs = self.propagation_delay.as_secs(),
                "Waiting for role to propagate"
            );
            tokio::time::sleep(self.propagation_delay).await;
        }

        let created = if reused {
            Created::reused(name)
        } else {
            Created::new(name)
        };
        Ok(created.with_output(ConfigField::RoleArn, arn))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        match self.remove_role(handle.as_str()).await? {
            Some(()) => {
                info!(role = %handle, "Role deleted");
                Ok(Deleted::Removed)
            }
            None => Ok(Deleted::AlreadyAbsent),
        }
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let found = sdk_optional(
            self.client.get_role().role_name(handle.as_str()).send().await,
            "GetRole",
        )?;
        Ok(match found {
            Some(_) => ResourceState::Ready,
            None => ResourceState::NotFound,
        })
    }
}
