pub mod agent;
pub mod config;
pub mod crd;
pub mod credentials;
pub mod function;
pub mod kubernetes;
pub mod metrics;
pub mod server;

use thiserror::Error;

pub use function::StatusTransformer;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Credential error: {0}")]
    Credentials(#[from] credentials::CredentialError),
    #[error("Model error: {0}")]
    Model(#[from] agent::ModelError),
    #[error("Conversation error: {0}")]
    Conversation(#[from] agent::ConversationError),
    #[error("Status error: {0}")]
    Status(#[from] agent::StatusError),
    #[error("Render error: {0}")]
    Render(#[from] agent::RenderError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
