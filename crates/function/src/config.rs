use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_BEDROCK_MODEL: &str = "us.anthropic.claude-sonnet-4-20250514-v1:0";

/// Where Secrets referenced by a FunctionConfig are read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SecretSourceKind {
    /// The credentials bundled with each RunFunctionRequest.
    #[serde(rename = "request")]
    #[default]
    Request,
    /// Secrets read from the API server.
    #[serde(rename = "cluster")]
    Cluster,
}

impl FromStr for SecretSourceKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "request" => Ok(SecretSourceKind::Request),
            "cluster" => Ok(SecretSourceKind::Cluster),
            other => Err(crate::Error::Config(format!(
                "unknown secret source {:?}, expected \"request\" or \"cluster\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub conversation: ConversationConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
    /// Upper bound on a single RunFunction call, model round-trips included.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub anthropic_base_url: String,
    pub anthropic_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub max_tokens: u32,
    pub max_turns: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub secret_source: SecretSourceKind,
    pub enable_function_configs: bool,
    pub function_config_resync_seconds: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl CredentialsConfig {
    pub fn function_config_resync(&self) -> Duration {
        Duration::from_secs(self.function_config_resync_seconds)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        let secret_source = match std::env::var("SECRET_SOURCE") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.credentials.secret_source,
        };

        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or(defaults.server.addr),
                request_timeout_seconds: env_or(
                    "REQUEST_TIMEOUT_SECONDS",
                    defaults.server.request_timeout_seconds,
                ),
            },
            model: ModelConfig {
                anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL")
                    .unwrap_or(defaults.model.anthropic_base_url),
                anthropic_model: std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or(defaults.model.anthropic_model),
            },
            conversation: ConversationConfig {
                max_tokens: env_or("MAX_TOKENS", defaults.conversation.max_tokens),
                max_turns: env_or("MAX_TURNS", defaults.conversation.max_turns),
            },
            credentials: CredentialsConfig {
                secret_source,
                enable_function_configs: env_or(
                    "ENABLE_FUNCTION_CONFIGS",
                    defaults.credentials.enable_function_configs,
                ),
                function_config_resync_seconds: env_or(
                    "FUNCTION_CONFIG_RESYNC_SECONDS",
                    defaults.credentials.function_config_resync_seconds,
                ),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.conversation.max_turns == 0 {
            return Err(crate::Error::Config(
                "MAX_TURNS must be at least 1".to_string(),
            ));
        }
        if self.conversation.max_tokens == 0 {
            return Err(crate::Error::Config(
                "MAX_TOKENS must be at least 1".to_string(),
            ));
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(crate::Error::Config(
                "REQUEST_TIMEOUT_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.credentials.secret_source == SecretSourceKind::Cluster
            && !self.credentials.enable_function_configs
        {
            tracing::warn!(
                "SECRET_SOURCE=cluster has no effect unless FunctionConfig support is enabled"
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:9443".to_string(),
                request_timeout_seconds: 120,
            },
            model: ModelConfig {
                anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
                anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            },
            conversation: ConversationConfig {
                max_tokens: 1024,
                max_turns: 5,
            },
            credentials: CredentialsConfig {
                secret_source: SecretSourceKind::Request,
                enable_function_configs: false,
                function_config_resync_seconds: 3600,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_secret_source_parsing() {
        assert_eq!(assert_ok!("request".parse::<SecretSourceKind>()), SecretSourceKind::Request);
        assert_eq!(assert_ok!("Cluster".parse::<SecretSourceKind>()), SecretSourceKind::Cluster);
        assert_err!("vault".parse::<SecretSourceKind>());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_ok!(config.validate());
        assert_eq!(config.conversation.max_turns, 5);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_zero_turns_rejected() {
        let mut config = Config::default();
        config.conversation.max_turns = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }
}
