//! AWS Bedrock client
//!
//! Calls `InvokeModel` on the Bedrock runtime with an Anthropic Messages
//! body, signed with SigV4.

use async_trait::async_trait;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;
use std::time::{Duration, SystemTime};
use tracing::debug;
use url::Url;

use super::message::{MessageRequest, ModelReply};
use super::provider::{read_reply, ModelError, ModelService};
use crate::credentials::AwsCredentials;

pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const SERVICE: &str = "bedrock";

pub struct BedrockClient {
    client: reqwest::Client,
    region: String,
    endpoint: Url,
    credentials: AwsCredentials,
}

impl BedrockClient {
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Result<Self, ModelError> {
        let region = region.into();
        let endpoint = Url::parse(&format!("https://bedrock-runtime.{}.amazonaws.com", region))
            .map_err(|e| ModelError::Signing(format!("invalid Bedrock endpoint for region {:?}: {}", region, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            region,
            endpoint,
            credentials,
        })
    }

    /// Use a custom endpoint, e.g. a VPC endpoint.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Path of the InvokeModel call as it goes on the wire.
    pub fn invoke_path(model_id: &str) -> String {
        format!("/model/{}/invoke", urlencoding::encode(model_id))
    }

    /// The Messages request without `model`, which Bedrock takes from the path.
    pub fn request_body(request: &MessageRequest) -> Result<Vec<u8>, ModelError> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| ModelError::UnexpectedResponse(format!("cannot encode request: {}", e)))?;
        if let Some(object) = body.as_object_mut() {
            object.remove("model");
            object.insert(
                "anthropic_version".to_string(),
                serde_json::Value::String(BEDROCK_ANTHROPIC_VERSION.to_string()),
            );
        }
        serde_json::to_vec(&body)
            .map_err(|e| ModelError::UnexpectedResponse(format!("cannot encode request: {}", e)))
    }

    /// SigV4 headers for a POST of `body` to `url`: `x-amz-date`,
    /// `authorization`, and `x-amz-security-token` for temporary credentials.
    fn signed_headers(&self, url: &str, body: &[u8], time: SystemTime) -> Result<Vec<(String, String)>, ModelError> {
        let identity = self.credentials.clone().into();
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SERVICE)
            .time(time)
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| ModelError::Signing(e.to_string()))?
            .into();
        let signable = SignableRequest::new(
            "POST",
            url,
            [("content-type", "application/json")].into_iter(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| ModelError::Signing(e.to_string()))?;
        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| ModelError::Signing(e.to_string()))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

#[async_trait]
impl ModelService for BedrockClient {
    async fn create_message(&self, request: &MessageRequest) -> Result<ModelReply, ModelError> {
        let path = Self::invoke_path(&request.model);
        let body = Self::request_body(request)?;

        // The path is already encoded; keep Url from touching it again.
        let url = format!("{}{}", self.endpoint.as_str().trim_end_matches('/'), path);
        debug!(provider = "bedrock", region = %self.region, model = %request.model, messages = request.messages.len(), "Sending message request");

        let signed = self.signed_headers(&url, &body, SystemTime::now())?;

        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "application/json");
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await?;
        read_reply(response, "bedrock").await
    }
}
