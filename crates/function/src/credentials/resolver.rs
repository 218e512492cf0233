//! Model Resolution
//!
//! Picks the model service for a request: the Anthropic API with the
//! request's API key, or Bedrock with AWS credentials derived from an
//! optional FunctionConfig.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::aws::derive_credentials;
use super::{anthropic, CredentialError, RequestSecrets, SecretSource};
use crate::agent::{AnthropicClient, BedrockClient, ModelService};
use crate::config::ModelConfig;
use crate::crd::{AwsInput, FunctionConfigSpec, StatusTransformation};
use crate::function::request::RunFunctionRequest;

/// An authenticated model service and the model to ask for.
#[derive(Clone)]
pub struct ResolvedModel {
    pub service: Arc<dyn ModelService>,
    pub model: String,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel").field("model", &self.model).finish()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelResolver: Send + Sync {
    async fn resolve(
        &self,
        input: &StatusTransformation,
        request: &RunFunctionRequest,
    ) -> Result<ResolvedModel, CredentialError>;
}

/// Look up FunctionConfigs by name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FunctionConfigSource: Send + Sync {
    async fn get(&self, name: &str) -> Result<FunctionConfigSpec, CredentialError>;
}

pub struct CredentialResolver {
    model: ModelConfig,
    function_configs: Option<Arc<dyn FunctionConfigSource>>,
    cluster_secrets: Option<Arc<dyn SecretSource>>,
}

impl CredentialResolver {
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            function_configs: None,
            cluster_secrets: None,
        }
    }

    /// Allow inputs to reference FunctionConfigs.
    pub fn with_function_configs(mut self, source: Arc<dyn FunctionConfigSource>) -> Self {
        self.function_configs = Some(source);
        self
    }

    /// Read FunctionConfig Secrets from here instead of the request's
    /// credential bundle.
    pub fn with_cluster_secrets(mut self, source: Arc<dyn SecretSource>) -> Self {
        self.cluster_secrets = Some(source);
        self
    }

    fn resolve_direct(&self, request: &RunFunctionRequest) -> Result<ResolvedModel, CredentialError> {
        let secrets = RequestSecrets::new(request.credentials.clone());
        let key = anthropic::api_key(&secrets)?;
        let client = AnthropicClient::new(key)
            .map_err(|e| CredentialError::Client(e.to_string()))?
            .with_base_url(&self.model.anthropic_base_url);

        info!(provider = "anthropic", model = %self.model.anthropic_model, "Resolved model service");
        Ok(ResolvedModel {
            service: Arc::new(client),
            model: self.model.anthropic_model.clone(),
        })
    }

    async fn resolve_bedrock(
        &self,
        aws: &AwsInput,
        request: &RunFunctionRequest,
    ) -> Result<ResolvedModel, CredentialError> {
        let config = match &aws.function_config_ref {
            None => None,
            Some(reference) => {
                let source = self
                    .function_configs
                    .as_ref()
                    .ok_or_else(|| CredentialError::FunctionConfigsDisabled(reference.name.clone()))?;
                debug!(function_config = %reference.name, "Looking up FunctionConfig");
                Some(source.get(&reference.name).await?)
            }
        };

        let request_secrets;
        let secrets: &dyn SecretSource = match &self.cluster_secrets {
            Some(cluster) => cluster.as_ref(),
            None => {
                request_secrets = RequestSecrets::new(request.credentials.clone());
                &request_secrets
            }
        };

        let credentials = derive_credentials(config.as_ref(), secrets, aws.region()).await?;
        let client = BedrockClient::new(aws.region(), credentials)
            .map_err(|e| CredentialError::Client(e.to_string()))?;

        info!(provider = "bedrock", region = %aws.region(), model = %aws.model_id(), "Resolved model service");
        Ok(ResolvedModel {
            service: Arc::new(client),
            model: aws.model_id().to_string(),
        })
    }
}

#[async_trait]
impl ModelResolver for CredentialResolver {
    async fn resolve(
        &self,
        input: &StatusTransformation,
        request: &RunFunctionRequest,
    ) -> Result<ResolvedModel, CredentialError> {
        match &input.aws {
            Some(aws) => self.resolve_bedrock(aws, request).await,
            None => self.resolve_direct(request),
        }
    }
}
