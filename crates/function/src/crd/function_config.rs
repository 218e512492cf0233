use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster-wide configuration the function reads through the API server.
#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
#[kube(
    group = "function-claude-status-transformer.fn.crossplane.io",
    version = "v1alpha1",
    kind = "FunctionConfig",
    status = "FunctionConfigStatus"
)]
pub struct FunctionConfigSpec {
    /// AWS credential configuration for Bedrock
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AwsConfig {
    pub credentials: AwsCredentialsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct AwsCredentialsConfig {
    /// Where credentials come from
    pub source: CredentialsSource,

    /// Secret holding the credentials when source is Secret
    #[serde(rename = "secretRef", skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,

    /// Profile to read from an INI credentials file. Defaults to "default".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum CredentialsSource {
    /// A shared credentials file or flat keys in a Secret.
    Secret,
    /// The function's environment variables.
    Environment,
    /// IAM Roles for Service Accounts, via the projected web identity token.
    #[serde(rename = "IRSA")]
    Irsa,
    /// EKS Pod Identity, via the container credentials endpoint.
    PodIdentity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key holding an INI credentials file. Defaults to "credentials".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct FunctionConfigStatus {
    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl SecretKeySelector {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or("credentials")
    }
}

impl AwsCredentialsConfig {
    pub fn profile(&self) -> &str {
        self.profile.as_deref().unwrap_or("default")
    }
}
