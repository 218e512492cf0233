//! AWS credentials for Bedrock
//!
//! Credentials come from a FunctionConfig (a Secret, IRSA, Pod Identity or
//! the function's environment) or, without one, from the default AWS
//! provider chain.

use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use std::collections::BTreeMap;
use tracing::debug;

use super::{CredentialError, SecretKey, SecretSource};
use crate::crd::{CredentialsSource, FunctionConfigSpec};

const ACCESS_KEY_ID: &str = "aws_access_key_id";
const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN: &str = "aws_session_token";

const SECRET_PROVIDER: &str = "FunctionConfigSecret";

/// Resolve credentials through the default provider chain: environment
/// variables, shared config files, web identity tokens (IRSA), container
/// and Pod Identity endpoints, then instance metadata.
pub async fn from_provider_chain(region: &str) -> Result<Credentials, CredentialError> {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
    let provider = config
        .credentials_provider()
        .ok_or_else(|| CredentialError::InvalidAws("no AWS credentials provider is configured".to_string()))?;

    provider
        .provide_credentials()
        .await
        .map_err(|e| CredentialError::InvalidAws(format!("cannot load credentials from the default chain: {}", e)))
}

/// Read credentials from secret data: a shared credentials file under
/// `file_key`, or flat `aws_access_key_id` style entries.
pub async fn from_secret_data(
    data: &BTreeMap<String, Vec<u8>>,
    file_key: &str,
    profile: &str,
) -> Result<Credentials, CredentialError> {
    if let Some(file) = data.get(file_key) {
        let files = ProfileFiles::builder()
            .with_contents(ProfileFileKind::Credentials, String::from_utf8_lossy(file).into_owned())
            .build();
        let provider = ProfileFileCredentialsProvider::builder()
            .profile_files(files)
            .profile_name(profile)
            .build();
        return provider.provide_credentials().await.map_err(|e| {
            CredentialError::InvalidAws(format!("cannot read profile {:?} from {:?}: {}", profile, file_key, e))
        });
    }

    let lookup = |name: &str| {
        data.get(name)
            .or_else(|| data.get(&name.to_uppercase()))
            .map(|v| String::from_utf8_lossy(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let access_key_id = lookup(ACCESS_KEY_ID)
        .ok_or_else(|| CredentialError::InvalidAws(format!("the secret has no {}", ACCESS_KEY_ID)))?;
    let secret_access_key = lookup(SECRET_ACCESS_KEY)
        .ok_or_else(|| CredentialError::InvalidAws(format!("the secret has no {}", SECRET_ACCESS_KEY)))?;

    Ok(Credentials::new(
        access_key_id,
        secret_access_key,
        lookup(SESSION_TOKEN),
        None,
        SECRET_PROVIDER,
    ))
}

/// Derive credentials for Bedrock from an optional FunctionConfig.
pub async fn derive_credentials(
    config: Option<&FunctionConfigSpec>,
    secrets: &dyn SecretSource,
    region: &str,
) -> Result<Credentials, CredentialError> {
    let credentials = match config.and_then(|c| c.aws.as_ref()) {
        Some(aws) => &aws.credentials,
        None => {
            debug!("No FunctionConfig AWS credentials configured, using the default provider chain");
            return from_provider_chain(region).await;
        }
    };

    match credentials.source {
        CredentialsSource::Environment | CredentialsSource::Irsa | CredentialsSource::PodIdentity => {
            debug!(source = ?credentials.source, "Loading AWS credentials from the default provider chain");
            from_provider_chain(region).await
        }
        CredentialsSource::Secret => {
            let selector = credentials.secret_ref.as_ref().ok_or_else(|| {
                CredentialError::InvalidAws("source is Secret but no secretRef is set".to_string())
            })?;
            let key = SecretKey {
                name: selector.name.clone(),
                namespace: selector.namespace.clone(),
            };
            let data = secrets.get(&key).await?;
            debug!(secret = %key, keys = data.len(), "Read AWS credentials secret");
            from_secret_data(&data, selector.key(), credentials.profile()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MockSecretSource;
    use crate::crd::{AwsConfig, AwsCredentialsConfig, SecretKeySelector};

    const INI: &str = "\
[other]
aws_access_key_id = OTHER
aws_secret_access_key = other-secret

[default]
aws_access_key_id = AKIDEXAMPLE
aws_secret_access_key = secret
aws_session_token = token
";

    fn secret_config(key: Option<&str>) -> FunctionConfigSpec {
        FunctionConfigSpec {
            aws: Some(AwsConfig {
                credentials: AwsCredentialsConfig {
                    source: CredentialsSource::Secret,
                    secret_ref: Some(SecretKeySelector {
                        name: "aws-creds".to_string(),
                        namespace: Some("crossplane-system".to_string()),
                        key: key.map(str::to_string),
                    }),
                    profile: None,
                },
            }),
        }
    }

    fn ini_data(key: &str) -> BTreeMap<String, Vec<u8>> {
        let mut data = BTreeMap::new();
        data.insert(key.to_string(), INI.as_bytes().to_vec());
        data
    }

    #[tokio::test]
    async fn test_from_secret_data_ini() {
        let creds = from_secret_data(&ini_data("credentials"), "credentials", "default").await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDEXAMPLE");
        assert_eq!(creds.secret_access_key(), "secret");
        assert_eq!(creds.session_token(), Some("token"));
    }

    #[tokio::test]
    async fn test_from_secret_data_selects_profile() {
        let creds = from_secret_data(&ini_data("credentials"), "credentials", "other").await.unwrap();
        assert_eq!(creds.access_key_id(), "OTHER");
        assert!(creds.session_token().is_none());
    }

    #[tokio::test]
    async fn test_from_secret_data_missing_profile() {
        let err = from_secret_data(&ini_data("credentials"), "credentials", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::InvalidAws(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_from_secret_data_flat_keys() {
        let mut data = BTreeMap::new();
        data.insert("AWS_ACCESS_KEY_ID".to_string(), b"AKID\n".to_vec());
        data.insert("aws_secret_access_key".to_string(), b"secret".to_vec());
        let creds = from_secret_data(&data, "credentials", "default").await.unwrap();
        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "secret");
        assert!(creds.session_token().is_none());
    }

    #[tokio::test]
    async fn test_from_secret_data_incomplete() {
        let mut data = BTreeMap::new();
        data.insert("aws_access_key_id".to_string(), b"AKID".to_vec());
        let err = from_secret_data(&data, "credentials", "default").await.unwrap_err();
        assert!(err.to_string().contains("aws_secret_access_key"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("AKID", "super-secret", None, None, SECRET_PROVIDER);
        assert!(!format!("{:?}", creds).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_derive_from_secret() {
        let mut secrets = MockSecretSource::new();
        secrets
            .expect_get()
            .withf(|key| key.name == "aws-creds" && key.namespace.as_deref() == Some("crossplane-system"))
            .times(1)
            .returning(|_| Ok(ini_data("creds")));

        let config = secret_config(Some("creds"));
        let creds = derive_credentials(Some(&config), &secrets, "us-east-1").await.unwrap();
        assert_eq!(creds.access_key_id(), "AKIDEXAMPLE");
    }

    #[tokio::test]
    async fn test_derive_propagates_secret_errors() {
        let mut secrets = MockSecretSource::new();
        secrets
            .expect_get()
            .returning(|key| Err(CredentialError::MissingCredential(key.name.clone())));

        let config = secret_config(None);
        let result = derive_credentials(Some(&config), &secrets, "us-east-1").await;
        assert!(matches!(result, Err(CredentialError::MissingCredential(n)) if n == "aws-creds"));
    }

    #[tokio::test]
    async fn test_derive_secret_source_requires_ref() {
        let secrets = MockSecretSource::new();
        let mut config = secret_config(None);
        if let Some(aws) = config.aws.as_mut() {
            aws.credentials.secret_ref = None;
        }
        let result = derive_credentials(Some(&config), &secrets, "us-east-1").await;
        assert!(matches!(result, Err(CredentialError::InvalidAws(_))));
    }
}
