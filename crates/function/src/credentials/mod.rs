//! Credential Resolution
//!
//! Turns a function input plus the request's credential bundle into an
//! authenticated model service handle.

pub mod anthropic;
pub mod aws;
pub mod resolver;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::function::request::Credentials;

pub use aws_credential_types::Credentials as AwsCredentials;
pub use resolver::{CredentialResolver, FunctionConfigSource, ModelResolver, ResolvedModel};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential {0:?} not found in the request")]
    MissingCredential(String),
    #[error("expected credential {0:?} to be of type data")]
    NotData(String),
    #[error("credential {name:?} is missing required key {key:?}")]
    MissingKey { name: String, key: String },
    #[error("secret {0} not found")]
    SecretNotFound(String),
    #[error("cannot read secret {name}: {source}")]
    Kubernetes {
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("FunctionConfig {0:?} not found")]
    FunctionConfigNotFound(String),
    #[error("FunctionConfig {0:?} was referenced but FunctionConfig support is disabled")]
    FunctionConfigsDisabled(String),
    #[error("invalid AWS credentials: {0}")]
    InvalidAws(String),
    #[error("cannot build model client: {0}")]
    Client(String),
}

/// Identifies a named set of secret bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    pub name: String,
    pub namespace: Option<String>,
}

impl std::fmt::Display for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Fetch named credential bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get(&self, key: &SecretKey) -> Result<BTreeMap<String, Vec<u8>>, CredentialError>;
}

/// Reads secrets from the credentials Crossplane bundles into the request,
/// so the function needs no API server access for them. Namespaces are
/// ignored: credentials are keyed by name only.
pub struct RequestSecrets {
    credentials: BTreeMap<String, Credentials>,
}

impl RequestSecrets {
    pub fn new(credentials: BTreeMap<String, Credentials>) -> Self {
        Self { credentials }
    }

    pub fn data(&self, name: &str) -> Result<BTreeMap<String, Vec<u8>>, CredentialError> {
        let credentials = self
            .credentials
            .get(name)
            .ok_or_else(|| CredentialError::MissingCredential(name.to_string()))?;
        let data = credentials
            .credential_data
            .as_ref()
            .ok_or_else(|| CredentialError::NotData(name.to_string()))?;
        Ok(data
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.0.clone()))
            .collect())
    }
}

#[async_trait]
impl SecretSource for RequestSecrets {
    async fn get(&self, key: &SecretKey) -> Result<BTreeMap<String, Vec<u8>>, CredentialError> {
        debug!(secret = %key, "Reading secret from request credentials");
        self.data(&key.name)
    }
}

/// Reads Secrets from the API server.
pub struct ClusterSecrets {
    client: Client,
    default_namespace: String,
}

impl ClusterSecrets {
    pub fn new(client: Client, default_namespace: impl Into<String>) -> Self {
        Self {
            client,
            default_namespace: default_namespace.into(),
        }
    }
}

#[async_trait]
impl SecretSource for ClusterSecrets {
    async fn get(&self, key: &SecretKey) -> Result<BTreeMap<String, Vec<u8>>, CredentialError> {
        let namespace = key.namespace.as_deref().unwrap_or(&self.default_namespace);
        debug!(secret = %key, namespace, "Reading secret from the API server");

        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(&key.name)
            .await
            .map_err(|source| CredentialError::Kubernetes {
                name: key.to_string(),
                source,
            })?
            .ok_or_else(|| CredentialError::SecretNotFound(format!("{}/{}", namespace, key.name)))?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }
}
