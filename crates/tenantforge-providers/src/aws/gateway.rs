use async_trait::async_trait;
use aws_sdk_apigateway::types::{EndpointConfiguration, EndpointType, IntegrationType};
use tenantforge_core::{ConfigField, ResourceHandle, ResourceKind};
use tracing::{info, warn};

use super::classify::{ErrorClass, classify, sdk_optional, sdk_result};
use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{CreateRequest, Created, Deleted, ResourceState};

/// Public URL of a deployed stage.
pub(crate) fn invoke_url(api_id: &str, region: &str, stage: &str) -> String {
    format!("https://{api_id}.execute-api.{region}.amazonaws.com/{stage}")
}

/// Integration URI proxying to a function.
pub(crate) fn integration_uri(region: &str, function_arn: &str) -> String {
    format!(
        "arn:aws:apigateway:{region}:lambda:path/2015-03-31/functions/{function_arn}/invocations"
    )
}

/// Account id embedded in an ARN (`arn:partition:service:region:account:...`).
pub(crate) fn account_of(arn: &str) -> Option<&str> {
    arn.split(':').nth(4).filter(|account| !account.is_empty())
}

/// Regional REST API whose root `GET` proxies to the tenant's function.
#[derive(Debug, Clone)]
pub struct GatewayProvider {
    client: aws_sdk_apigateway::Client,
    lambda: aws_sdk_lambda::Client,
    stage: String,
}

impl GatewayProvider {
    pub fn new(
        client: aws_sdk_apigateway::Client,
        lambda: aws_sdk_lambda::Client,
        stage: String,
    ) -> Self {
        Self {
            client,
            lambda,
            stage,
        }
    }

    /// Everything after the API exists: route, integration, deployment and
    /// the permission for the gateway to invoke the function.
    async fn wire(&self, api_id: &str, region: &str, function_arn: &str) -> Result<(), ProviderError> {
        let resources = sdk_result(
            self.client.get_resources().rest_api_id(api_id).send().await,
            "GetResources",
        )?;
        let root_id = resources
            .items()
            .iter()
            .find(|resource| resource.path() == Some("/"))
            .and_then(|resource| resource.id())
            .ok_or_else(|| ProviderError::rejected(format!("API {api_id} has no root resource")))?
            .to_string();

        sdk_result(
            self.client
                .put_method()
                .rest_api_id(api_id)
                .resource_id(&root_id)
                .http_method("GET")
                .authorization_type("NONE")
                .send()
                .await,
            "PutMethod",
        )?;
        sdk_result(
            self.client
                .put_integration()
                .rest_api_id(api_id)
                .resource_id(&root_id)
                .http_method("GET")
                .integration_http_method("POST")
                .r#type(IntegrationType::from("AWS_PROXY"))
                .uri(integration_uri(region, function_arn))
                .send()
                .await,
            "PutIntegration",
        )?;
        sdk_result(
            self.client
                .put_method_response()
                .rest_api_id(api_id)
                .resource_id(&root_id)
                .http_method("GET")
                .status_code("200")
                .response_models("application/json", "Empty")
                .send()
                .await,
            "PutMethodResponse",
        )?;
        sdk_result(
            self.client
                .put_integration_response()
                .rest_api_id(api_id)
                .resource_id(&root_id)
                .http_method("GET")
                .status_code("200")
                .selection_pattern("")
                .send()
                .await,
            "PutIntegrationResponse",
        )?;
        sdk_result(
            self.client
                .create_deployment()
                .rest_api_id(api_id)
                .stage_name(&self.stage)
                .send()
                .await,
            "CreateDeployment",
        )?;

        let account = account_of(function_arn).ok_or_else(|| {
            ProviderError::rejected(format!("cannot read account from '{function_arn}'"))
        })?;
        let source_arn = format!("arn:aws:execute-api:{region}:{account}:{api_id}/*/GET/");
        let granted = self
            .lambda
            .add_permission()
            .function_name(function_arn)
            .statement_id(format!("apigateway-invoke-{api_id}"))
            .action("lambda:InvokeFunction")
            .principal("apigateway.amazonaws.com")
            .source_arn(source_arn)
            .send()
            .await;
        if let Err(err) = granted {
            let classified = classify(&err);
            if classified.class != ErrorClass::Conflict {
                return Err(classified.into_provider_error("AddPermission"));
            }
            info!(api_id, "Invoke permission already granted");
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvider for GatewayProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Gateway
    }

    async fn create(&self, request: &CreateRequest) -> Result<Created, ProviderError> {
        let name = request.input(ConfigField::GatewayName)?;
        let region = request.input(ConfigField::Region)?;
        let function_arn = request.input(ConfigField::FunctionArn)?;

        let output = sdk_result(
            self.client
                .create_rest_api()
                .name(name)
                .description("Gateway for the tenant function")
                .version("1.0")
                .endpoint_configuration(
                    EndpointConfiguration::builder()
                        .types(EndpointType::from("REGIONAL"))
                        .build(),
                )
                .send()
                .await,
            "CreateRestApi",
        )?;
        let api_id = output
            .id()
            .ok_or_else(|| ProviderError::rejected(format!("API '{name}' returned no id")))?
            .to_string();

        if let Err(err) = self.wire(&api_id, region, function_arn).await {
            warn!(api_id = %api_id, error = %err, "Gateway setup failed, removing API");
            if let Err(cleanup) = sdk_optional(
                self.client.delete_rest_api().rest_api_id(&api_id).send().await,
                "DeleteRestApi",
            ) {
                warn!(api_id = %api_id, error = %cleanup, "Failed to remove partially created API");
                return Err(err.with_orphan(api_id.as_str()));
            }
            return Err(err);
        }

        let url = invoke_url(&api_id, region, &self.stage);
        info!(name, api_id = %api_id, url = %url, "Gateway deployed");
        Ok(Created::new(api_id.as_str())
            .with_output(ConfigField::GatewayId, api_id.as_str())
            .with_output(ConfigField::GatewayUrl, url))
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<Deleted, ProviderError> {
        let deleted = sdk_optional(
            self.client
                .delete_rest_api()
                .rest_api_id(handle.as_str())
                .send()
                .await,
            "DeleteRestApi",
        )?;
        Ok(match deleted {
            Some(_) => {
                info!(api_id = %handle, "Gateway deleted");
                Deleted::Removed
            }
            None => Deleted::AlreadyAbsent,
        })
    }

    async fn describe(&self, handle: &ResourceHandle) -> Result<ResourceState, ProviderError> {
        let found = sdk_optional(
            self.client
                .get_rest_api()
                .rest_api_id(handle.as_str())
                .send()
                .await,
            "GetRestApi",
        )?;
        Ok(match found {
            Some(_) => ResourceState::Ready,
            None => ResourceState::NotFound,
        })
    }
}
