//! Composition Function
//!
//! `StatusTransformer` handles one RunFunctionRequest end to end: render the
//! observed state into a prompt, hold the conversation with Claude, and
//! report the outcome as a condition on the composite resource.

pub mod request;
pub mod response;

use std::fmt::Display;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::status::ConditionParts;
use crate::agent::{
    resource_to_text, resources_to_text, CompositionStatus, ConversationDriver, ConversationError,
    PromptRenderer, PromptVariables, CONDITION_TYPE,
};
use crate::config::ConversationConfig;
use crate::credentials::ModelResolver;
use crate::crd::StatusTransformation;
use crate::{metrics, Error, Result};

use request::{Resource, RunFunctionRequest, RunFunctionResponse};

enum Failure {
    Fatal(String),
    Cancelled,
}

fn step<E: Display>(context: &'static str) -> impl FnOnce(E) -> Failure {
    move |e| Failure::Fatal(format!("{}: {}", context, e))
}

pub struct StatusTransformer {
    resolver: Arc<dyn ModelResolver>,
    prompts: PromptRenderer,
    max_tokens: u32,
    max_turns: u32,
}

impl StatusTransformer {
    pub fn new(resolver: Arc<dyn ModelResolver>, conversation: &ConversationConfig) -> Result<Self> {
        Ok(Self {
            resolver,
            prompts: PromptRenderer::new()?,
            max_tokens: conversation.max_tokens,
            max_turns: conversation.max_turns,
        })
    }

    /// Run the function. Failures are reported as a fatal result on the
    /// response; only cancellation is returned as an error.
    pub async fn run_function(
        &self,
        req: &RunFunctionRequest,
        cancel: &CancellationToken,
    ) -> Result<RunFunctionResponse> {
        let span = info_span!("run_function", tag = %req.meta.tag, run_id = %Uuid::new_v4());
        self.run(req, cancel).instrument(span).await
    }

    async fn run(&self, req: &RunFunctionRequest, cancel: &CancellationToken) -> Result<RunFunctionResponse> {
        info!("Running function");
        let mut rsp = response::to(req);

        match self.summarize(req, cancel).await {
            Ok(parts) => {
                info!(ready = parts.ready, summary = %parts.message, "Composition status updated");
                metrics::record_run(if parts.ready { "ready" } else { "not_ready" });
                response::set_condition(
                    &mut rsp,
                    CONDITION_TYPE,
                    parts.ready.into(),
                    parts.reason.clone(),
                    Some(parts.message.clone()),
                );
                response::normal(&mut rsp, parts.message, Some(parts.reason));
            }
            Err(Failure::Fatal(message)) => {
                warn!(error = %message, "Function run failed");
                metrics::record_run("fatal");
                response::fatal(&mut rsp, message);
            }
            Err(Failure::Cancelled) => {
                warn!("Function run cancelled");
                metrics::record_run("cancelled");
                return Err(Error::Cancelled);
            }
        }

        Ok(rsp)
    }

    async fn summarize(
        &self,
        req: &RunFunctionRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<ConditionParts, Failure> {
        let input = StatusTransformation::from_input(req.input.as_ref())
            .map_err(step("cannot get Function input"))?;

        let empty = Resource::default();
        let composite = req.observed.composite.as_ref().unwrap_or(&empty);
        let composite_text = resource_to_text(composite)
            .map_err(step("cannot convert observed composite resource to text"))?;
        let composed_text = resources_to_text(&req.observed.resources)
            .map_err(step("cannot convert observed composed resources to text"))?;

        let last_status = match composite.condition(CONDITION_TYPE) {
            Some(condition) => Some(
                CompositionStatus::from_condition(condition)
                    .map_err(step("cannot get last status from observed"))?,
            ),
            None => None,
        };
        let last_status = serde_json::to_string(&last_status)
            .map_err(step("cannot marshal last status to JSON"))?;

        let data = self
            .prompts
            .render(&PromptVariables {
                composite: composite_text,
                composed: composed_text,
                last_status,
                input: input.additional_context.clone(),
            })
            .map_err(step("cannot build prompt from template"))?;
        debug!(prompt = %data, "Using prompt");

        let resolved = self
            .resolver
            .resolve(&input, req)
            .await
            .map_err(step("cannot get model client"))?;

        let status = ConversationDriver::new(resolved.service, resolved.model)
            .with_max_tokens(self.max_tokens)
            .with_max_turns(self.max_turns)
            .run(self.prompts.system(), self.prompts.instructions(), &data, cancel)
            .await
            .map_err(|e| match e {
                ConversationError::Cancelled => Failure::Cancelled,
                ConversationError::Model(e) => Failure::Fatal(format!("cannot message the model: {}", e)),
                other => Failure::Fatal(other.to_string()),
            })?;

        status
            .to_condition_parts()
            .map_err(step("cannot marshal resource statuses to JSON"))
    }
}
