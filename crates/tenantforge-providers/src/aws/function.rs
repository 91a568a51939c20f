use std::io::{Cursor, Write};

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Environment, FunctionCode, Runtime};
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::FunctionSettings;
use super::classify::{ErrorClass, classify, sdk_optional, sdk_result};
use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{CreateRequest, Created, Deleted, ResourceState};

const HANDLER_SOURCE: &str = include_str!("handler.py");
const HANDLER_FILE: &str = "lambda_function.py";
const HANDLER_ENTRY: &str = "lambda_function.lambda_handler";
const DESCRIPTION: &str = "Submits the tenant's product sync job";

/// Packages the handler into an in-memory zip archive.
pub(crate) fn package_handler() -> Result<Vec<u8>, ProviderError> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(HANDLER_FILE, options)
            .map_err(|e| ProviderError::rejected(format!("packaging handler: {e}")))?;
        zip.write_all(HANDLER_SOURCE.as_bytes())
            .map_err(|e| ProviderError::rejected(format!("packaging handler: {e}")))?;
        zip.finish()
            .map_err(|e| ProviderError::rejected(format!("packaging handler: {e}")))?;
    }
    Ok(buffer.into_inner())
}

/// Function that submits a job to the tenant's queue.
#[derive(Debug, Clone)]
pub struct FunctionProvider {
    client: aws_sdk_lambda::Client,
    settings: FunctionSettings,
}

impl FunctionProvider {
    pub fn new(client: aws_sdk_lambda::Client, settings: FunctionSettings) -> Self {
        Self { client, settings }
    }

    /// Existing function: replace code and configuration in place.
    async fn update_existing(
        &self,
        name: &str,
        role_arn: &str,
        environment: Environment,
        archive: Vec<u8>,
    ) -> Result<Option<String>, ProviderError> {
        sdk_result(
            self.client
                .update_function_code()
                .function_name(name)
                .zip_file(Blob::new(archive))
                .send()
                .await,
            "UpdateFunctionCode",
        )?;
        let output = sdk_result(
            self.client
                .update_function_configuration()
                .function_name(name)
                .role(role_arn)
                .environment(environment)
                .send()
                .await,
            "UpdateFunctionConfiguration",
        )?;
        Ok(output.function_arn().map(str::to_string))
    }
}

#[async_trait]
impl ResourceProvider for FunctionProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Function
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::FunctionName)?;
        let role_arn = request.input(ConfigField::RoleArn)?;
        let environment = Environment::builder()
            .variables("JOB_QUEUE", request.input(ConfigField::JobQueueName)?)
            .variables("JOB_DEFINITION", request.input(ConfigField::JobDefinitionName)?)
            .variables("JOB_NAME", request.input(ConfigField::JobName)?)
            .build();
        let archive = package_handler()?;

        let result = self
            .client
            .create_function()
            .function_name(name)
            .runtime(Runtime::from(self.settings.runtime.as_str()))
            .role(role_arn)
            .handler(HANDLER_ENTRY)
            .code(FunctionCode::builder().zip_file(Blob::new(archive.clone())).build())
            .description(DESCRIPTION)
            .timeout(self.settings.timeout_secs)
            .memory_size(self.settings.memory_mb)
            .environment(environment.clone())
            .send()
            .await;

        let (arn, reused) = match result {
            Ok(output) => (output.function_arn().map(str::to_string), false),
            Err(err) => {
                let classified = classify(&err);
                if classified.class != ErrorClass::Conflict {
                    return Err(classified.into_provider_error("CreateFunction"));
                }
                info!(function = name, "Function already exists, updating it");
                (
                    self.update_existing(name, role_arn, environment, archive)
                        .await?,
                    true,
                )
            }
        };

        let arn = arn.ok_or_else(|| {
            ProviderError::rejected(format!("function '{name}' returned no ARN"))
        })?;
        info!(function = name, arn = %arn, reused, "Function ready");

        let created = if reused {
            Created::reused(name)
        } else {
            Created::new(name)
        };
        Ok(created.with_output(ConfigField::FunctionArn, arn))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        let deleted = sdk_optional(
            self.client
                .delete_function()
                .function_name(handle.as_str())
                .send()
                .await,
            "DeleteFunction",
        )?;
        Ok(match deleted {
            Some(_) => {
                info!(function = %handle, "Function deleted");
                Deleted::Removed
            }
            None => Deleted::AlreadyAbsent,
        })
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let found = sdk_optional(
            self.client
                .get_function()
                .function_name(handle.as_str())
                .send()
                .await,
            "GetFunction",
        )?;
        let Some(output) = found else {
            return Ok(ResourceState::NotFound);
        };
        let configuration = output.configuration();
        let state = configuration.and_then(|c| c.state()).map(|s| s.as_str());
        Ok(match state {
            Some("Pending") => ResourceState::Pending,
            Some("Failed") => ResourceState::Failed(
                configuration
                    .and_then(|c| c.state_reason())
                    .unwrap_or("failed")
                    .to_string(),
            ),
            _ => ResourceState::Ready,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn handler_archive_contains_the_entry_point() {
        let bytes = package_handler().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);

        let mut file = archive.by_name(HANDLER_FILE).unwrap();
        let mut source = String::new();
        file.read_to_string(&mut source).unwrap();
        assert!(source.contains("def lambda_handler"));
        assert!(source.contains("JOB_QUEUE"));
    }
}
