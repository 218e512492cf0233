use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_AWS_REGION, DEFAULT_BEDROCK_MODEL};

pub const INPUT_API_VERSION: &str = "function-claude-status-transformer.fn.crossplane.io/v1beta1";
pub const INPUT_KIND: &str = "StatusTransformation";

/// Input supplied to the function from a Composition pipeline step.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Additional context the user may provide to help Claude identify issues.
    #[serde(default)]
    pub additional_context: String,

    /// Use AWS Bedrock as the model provider instead of Anthropic's API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsInput>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsInput {
    #[serde(default)]
    pub bedrock: BedrockInput,

    /// Region the Bedrock runtime is called in. Defaults to us-east-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// FunctionConfig holding the AWS credential configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_config_ref: Option<FunctionConfigReference>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct BedrockInput {
    /// Claude model (or inference profile) id.
    #[serde(rename = "modelID", default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct FunctionConfigReference {
    pub name: String,
}

impl StatusTransformation {
    /// Parse the pipeline step input. A step without input gets the defaults.
    pub fn from_input(input: Option<&serde_json::Value>) -> serde_json::Result<Self> {
        match input {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone()),
        }
    }

    pub fn use_aws(&self) -> bool {
        self.aws.is_some()
    }
}

impl AwsInput {
    pub fn region(&self) -> &str {
        self.region
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_AWS_REGION)
    }

    pub fn model_id(&self) -> &str {
        self.bedrock
            .model_id
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_BEDROCK_MODEL)
    }
}
