//! Claude Agent
//!
//! Everything needed to hold one status conversation with Claude: the
//! message model, the direct and Bedrock clients, prompts, resource
//! rendering, the status codec and the conversation loop.

pub mod anthropic;
pub mod bedrock;
pub mod conversation;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod resources;
pub mod status;

pub use anthropic::AnthropicClient;
pub use bedrock::BedrockClient;
pub use conversation::{ConversationDriver, ConversationError, TOOL_NAME};
pub use message::{ContentBlock, Message, MessageRequest, ModelReply};
pub use prompt::{PromptRenderer, PromptVariables, RenderError};
pub use provider::{ModelError, ModelService};
pub use resources::{resource_to_text, resources_to_text};
pub use status::{CompositionStatus, OverallStatus, ResourceStatus, StatusError, CONDITION_TYPE};
