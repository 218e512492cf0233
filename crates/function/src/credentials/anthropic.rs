use super::{CredentialError, RequestSecrets};

/// Name of the request credential holding the Anthropic API key.
pub const CREDENTIAL_NAME: &str = "claude";
pub const CREDENTIAL_KEY: &str = "ANTHROPIC_API_KEY";

/// Read the Anthropic API key from the request's credential bundle.
pub fn api_key(secrets: &RequestSecrets) -> Result<String, CredentialError> {
    let data = secrets.data(CREDENTIAL_NAME)?;
    let raw = data.get(CREDENTIAL_KEY).ok_or_else(|| CredentialError::MissingKey {
        name: CREDENTIAL_NAME.to_string(),
        key: CREDENTIAL_KEY.to_string(),
    })?;

    // Keys rendered from files often carry a trailing newline.
    let key = String::from_utf8_lossy(raw).trim_matches('\n').to_string();
    if key.is_empty() {
        return Err(CredentialError::MissingKey {
            name: CREDENTIAL_NAME.to_string(),
            key: CREDENTIAL_KEY.to_string(),
        });
    }
    Ok(key)
}
