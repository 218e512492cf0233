//! Anthropic Messages API client
//!
//! Authenticates with an `x-api-key` header and posts to `/v1/messages`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::message::{MessageRequest, ModelReply};
use super::provider::{read_reply, ModelError, ModelService};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: crate::config::DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Use a custom base URL (e.g. a proxy or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ModelService for AnthropicClient {
    async fn create_message(&self, request: &MessageRequest) -> Result<ModelReply, ModelError> {
        debug!(provider = "anthropic", model = %request.model, messages = request.messages.len(), "Sending message request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        read_reply(response, "anthropic").await
    }
}
