//! Conversation Driver
//!
//! Runs the tool-calling exchange with Claude: send the prompts, let the
//! model call `submit_status`, feed decode errors back as tool results,
//! and stop at the first status that decodes.

use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::{ContentBlock, Message, MessageRequest, SystemBlock, ToolDefinition};
use super::provider::{ModelError, ModelService};
use super::status::CompositionStatus;
use crate::metrics;

pub const TOOL_NAME: &str = "submit_status";
pub const TOOL_INPUT_FIELD: &str = "status_stream";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_MAX_TURNS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("{0}")]
    Model(#[from] ModelError),
    #[error("model called unknown tool {0:?}")]
    UnknownTool(String),
    #[error("tool submit_status was called without the required status_stream input")]
    MissingToolInput,
    #[error("model finished without calling submit_status: expected output not produced")]
    NoSubmission,
    #[error("model failed to produce a valid status after {attempts} attempts: {last_error}")]
    TurnsExhausted { attempts: u32, last_error: String },
    #[error("conversation cancelled")]
    Cancelled,
}

/// The single tool the model is offered.
pub fn submit_status_tool() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME.to_string(),
        description: "Submit the status of the composed resources.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "status_stream": {
                    "type": "string",
                    "description": "The status, as a JSON-encoded string."
                }
            },
            "required": ["status_stream"]
        }),
    }
}

/// Read `status_stream` out of a tool input. Models occasionally send the
/// status as an object rather than a string; that is accepted as-is.
fn status_stream(input: &Value) -> Result<String, ConversationError> {
    match input.get(TOOL_INPUT_FIELD) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(object @ Value::Object(_)) => Ok(object.to_string()),
        _ => Err(ConversationError::MissingToolInput),
    }
}

pub struct ConversationDriver {
    service: Arc<dyn ModelService>,
    model: String,
    max_tokens: u32,
    max_turns: u32,
}

impl ConversationDriver {
    pub fn new(service: Arc<dyn ModelService>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// At least one call is always made.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Drive the conversation to a submitted status.
    ///
    /// `instructions` is sent first and marked cacheable, `data` carries the
    /// rendered resources. Each model call counts as one turn.
    pub async fn run(
        &self,
        system: &str,
        instructions: &str,
        data: &str,
        cancel: &CancellationToken,
    ) -> Result<CompositionStatus, ConversationError> {
        let mut request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            system: vec![SystemBlock::cached(system)],
            tools: vec![submit_status_tool()],
            messages: vec![
                Message::user(vec![ContentBlock::cached_text(instructions)]),
                Message::user(vec![ContentBlock::text(data)]),
            ],
        };
        let mut last_error = String::new();

        for turn in 1..=self.max_turns {
            if cancel.is_cancelled() {
                return Err(ConversationError::Cancelled);
            }

            debug!(turn, model = %self.model, messages = request.messages.len(), "Messaging the model");
            let reply = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ConversationError::Cancelled),
                reply = self.service.create_message(&request) => reply,
            };
            let reply = match reply {
                Ok(reply) => {
                    metrics::record_model_call("success");
                    reply
                }
                Err(e) => {
                    metrics::record_model_call("error");
                    return Err(e.into());
                }
            };
            debug!(
                turn,
                id = %reply.id,
                stop_reason = ?reply.stop_reason,
                input_tokens = reply.usage.input_tokens,
                output_tokens = reply.usage.output_tokens,
                cache_read_tokens = ?reply.usage.cache_read_input_tokens,
                "Received model reply"
            );

            // The API is stateless, so the reply has to go back with the next call.
            request.messages.push(reply.to_message());

            let mut tool_results = Vec::new();
            for block in &reply.content {
                match block {
                    ContentBlock::Text { text, .. } => debug!(turn, text = %text, "Model says"),
                    ContentBlock::ToolUse { id, name, input } => {
                        if name != TOOL_NAME {
                            warn!(turn, tool = %name, "Model called an unknown tool");
                            return Err(ConversationError::UnknownTool(name.clone()));
                        }
                        let stream = status_stream(input)?;
                        debug!(turn, tool_use_id = %id, status = %stream, "Model submitted a status");

                        match CompositionStatus::decode(&stream) {
                            Ok(status) => {
                                info!(turn, overall_status = ?status.overall_status, "Status accepted");
                                return Ok(status);
                            }
                            Err(e) => {
                                warn!(turn, error = %e, "Submitted status does not decode, returning the error to the model");
                                metrics::record_malformed_submission();
                                last_error = e.to_string();
                                tool_results.push(ContentBlock::tool_result(id.clone(), last_error.clone(), true));
                            }
                        }
                    }
                    ContentBlock::ToolResult { .. } | ContentBlock::Unsupported => {}
                }
            }

            if tool_results.is_empty() {
                return Err(ConversationError::NoSubmission);
            }
            request.messages.push(Message::user(tool_results));
        }

        Err(ConversationError::TurnsExhausted {
            attempts: self.max_turns,
            last_error,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::message::{ModelReply, Role, Usage};
    use crate::agent::provider::MockModelService;
    use crate::agent::status::OverallStatus;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) const STALLED: &str = r#"{"resourceStatuses":[{"name":"db-1","kind":"RDSInstance","apiVersion":"v1","ready":false,"message":"creation stalled"}],"overallStatus":"NotReady","summary":"db-1 is stalled"}"#;

    /// Replays canned replies in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
        pub(crate) requests: Mutex<Vec<MessageRequest>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(replies: Vec<ModelReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(Ok).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: ModelError) -> Self {
            Self {
                replies: Mutex::new(VecDeque::from([Err(error)])),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<MessageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelService for ScriptedModel {
        async fn create_message(&self, request: &MessageRequest) -> Result<ModelReply, ModelError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::UnexpectedResponse("script exhausted".to_string())))
        }
    }

    pub(crate) fn reply(content: Vec<ContentBlock>) -> ModelReply {
        ModelReply {
            id: "msg_test".to_string(),
            content,
            stop_reason: Some("tool_use".to_string()),
            usage: Usage::default(),
        }
    }

    pub(crate) fn submit(id: &str, stream: &str) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: TOOL_NAME.to_string(),
            input: json!({ "status_stream": stream }),
        }
    }

    async fn run(model: Arc<ScriptedModel>) -> Result<CompositionStatus, ConversationError> {
        ConversationDriver::new(model, "claude-test")
            .run("system", "instructions", "data", &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_first_request_shape() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![submit("t1", STALLED)])]));
        run(model.clone()).await.unwrap();

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        let first = &requests[0];
        assert_eq!(first.model, "claude-test");
        assert_eq!(first.temperature, 0.0);
        assert_eq!(first.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(first.tools, vec![submit_status_tool()]);
        assert!(first.system[0].cache_control.is_some());
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].role, Role::User);
        assert_eq!(first.messages[0].content, vec![ContentBlock::cached_text("instructions")]);
        assert_eq!(first.messages[1].role, Role::User);
        assert_eq!(first.messages[1].content, vec![ContentBlock::text("data")]);
    }

    #[tokio::test]
    async fn test_stalled_resource_scenario() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![
            ContentBlock::text("Looking at the resources, db-1 is not ready."),
            submit("t1", STALLED),
        ])]));

        let status = tokio_test::assert_ok!(run(model).await);
        assert_eq!(status.overall_status, OverallStatus::NotReady);
        assert_eq!(status.summary, "db-1 is stalled");
        assert_eq!(status.resource_statuses[0].name, "db-1");
        assert!(!status.to_condition_parts().unwrap().ready);
    }

    #[tokio::test]
    async fn test_malformed_submission_is_retried() {
        let model = Arc::new(ScriptedModel::new(vec![
            reply(vec![submit("t1", r#"{"resourceStatuses": [}"#)]),
            reply(vec![submit("t2", STALLED)]),
        ]));

        let status = run(model.clone()).await.unwrap();
        assert_eq!(status.summary, "db-1 is stalled");

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[2].role, Role::Assistant);

        let feedback = &second.messages[3];
        assert_eq!(feedback.role, Role::User);
        match &feedback.content[..] {
            [ContentBlock::ToolResult { tool_use_id, content, is_error }] => {
                assert_eq!(tool_use_id, "t1");
                assert!(*is_error);
                let expected = CompositionStatus::decode(r#"{"resourceStatuses": [}"#).unwrap_err().to_string();
                assert_eq!(content, &expected);
            }
            other => panic!("unexpected feedback: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fatal() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![ContentBlock::ToolUse {
            id: "t1".to_string(),
            name: "other_tool".to_string(),
            input: json!({}),
        }])]));

        let err = run(model).await.unwrap_err();
        assert!(matches!(err, ConversationError::UnknownTool(ref name) if name == "other_tool"));
        assert!(err.to_string().contains("other_tool"));
    }

    #[tokio::test]
    async fn test_text_only_reply_is_fatal() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![ContentBlock::text(
            "Everything looks fine to me.",
        )])]));
        assert!(matches!(run(model).await, Err(ConversationError::NoSubmission)));
    }

    #[tokio::test]
    async fn test_missing_or_empty_input_is_fatal() {
        for input in [json!({}), json!({"status_stream": ""}), json!({"status_stream": 42})] {
            let model = Arc::new(ScriptedModel::new(vec![reply(vec![ContentBlock::ToolUse {
                id: "t1".to_string(),
                name: TOOL_NAME.to_string(),
                input,
            }])]));
            assert!(matches!(run(model).await, Err(ConversationError::MissingToolInput)));
        }
    }

    #[tokio::test]
    async fn test_object_input_is_accepted() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![ContentBlock::ToolUse {
            id: "t1".to_string(),
            name: TOOL_NAME.to_string(),
            input: json!({"status_stream": {"overallStatus": "Ready", "summary": "No unhealthy resources found"}}),
        }])]));

        let status = run(model).await.unwrap();
        assert_eq!(status.overall_status, OverallStatus::Ready);
        assert!(status.resource_statuses.is_empty());
    }

    #[tokio::test]
    async fn test_turns_are_bounded() {
        let model = Arc::new(ScriptedModel::new(vec![
            reply(vec![submit("t1", "not json")]),
            reply(vec![submit("t2", "still not json")]),
            reply(vec![submit("t3", STALLED)]),
        ]));

        let err = ConversationDriver::new(model.clone(), "claude-test")
            .with_max_turns(2)
            .run("system", "instructions", "data", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            ConversationError::TurnsExhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("cannot decode composition status"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_turns_still_calls_the_model() {
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![submit("t1", STALLED)])]));

        let status = ConversationDriver::new(model.clone(), "claude-test")
            .with_max_turns(0)
            .run("system", "instructions", "data", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.summary, "db-1 is stalled");
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_echoes_prior_status() {
        let prior = CompositionStatus::decode(STALLED).unwrap();
        let echoed = prior.encode().unwrap();
        let model = Arc::new(ScriptedModel::new(vec![reply(vec![submit("t1", &echoed)])]));

        let status = run(model).await.unwrap();
        assert_eq!(status, prior);
        assert_eq!(status.to_condition_parts().unwrap(), prior.to_condition_parts().unwrap());
    }

    #[tokio::test]
    async fn test_model_errors_propagate() {
        let model = Arc::new(ScriptedModel::failing(ModelError::RateLimited));
        assert!(matches!(
            run(model).await,
            Err(ConversationError::Model(ModelError::RateLimited))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_call() {
        let mut service = MockModelService::new();
        service.expect_create_message().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ConversationDriver::new(Arc::new(service), "claude-test")
            .run("system", "instructions", "data", &cancel)
            .await;
        assert!(matches!(result, Err(ConversationError::Cancelled)));
    }

    struct HangingModel;

    #[async_trait]
    impl ModelService for HangingModel {
        async fn create_message(&self, _request: &MessageRequest) -> Result<ModelReply, ModelError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_during_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = ConversationDriver::new(Arc::new(HangingModel), "claude-test")
            .run("system", "instructions", "data", &cancel)
            .await;
        assert!(matches!(result, Err(ConversationError::Cancelled)));
    }
}
