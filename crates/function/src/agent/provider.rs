//! Model service abstraction
//!
//! The conversation driver talks to Claude through this trait, whether the
//! model is reached directly or through AWS Bedrock.

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use super::message::{MessageRequest, ModelReply};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited by the model service")]
    RateLimited,
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("request signing failed: {0}")]
    Signing(String),
}

/// A single stateless Messages API round-trip.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn create_message(&self, request: &MessageRequest) -> Result<ModelReply, ModelError>;
}

/// Turn a Messages API HTTP response into a reply, mapping failure statuses
/// onto [`ModelError`].
pub(crate) async fn read_reply(response: reqwest::Response, provider: &str) -> Result<ModelReply, ModelError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ModelError::RateLimited);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(ModelError::Auth(format!("{} rejected the credentials: {}", provider, body)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(provider, status = status.as_u16(), body = %body, "Model service returned an error");
        return Err(ModelError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ModelError::UnexpectedResponse(format!("cannot decode {} reply: {}", provider, e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Uri};
    use axum::Router;
    use std::sync::{Arc, Mutex};

    pub(crate) const VALID_REPLY: &str = r#"{"id":"msg_1","type":"message","role":"assistant","model":"claude-test","content":[{"type":"text","text":"hello"}],"stop_reason":"end_turn","usage":{"input_tokens":12,"output_tokens":3}}"#;

    /// What the canned server saw for one request.
    #[derive(Debug, Clone)]
    pub(crate) struct Captured {
        pub(crate) path: String,
        pub(crate) headers: HeaderMap,
        pub(crate) body: Bytes,
    }

    impl Captured {
        pub(crate) fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).and_then(|v| v.to_str().ok())
        }

        pub(crate) fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).unwrap()
        }
    }

    /// Serve `body` with `status` for every request on a local port and
    /// record what came in.
    pub(crate) async fn canned_server(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = captured.clone();
        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, bytes: Bytes| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(Captured {
                    path: uri.path().to_string(),
                    headers,
                    body: bytes,
                });
                (axum::http::StatusCode::from_u16(status).unwrap(), body)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    async fn read_from(status: u16, body: &'static str) -> Result<ModelReply, ModelError> {
        let (url, _) = canned_server(status, body).await;
        let response = reqwest::Client::new().post(&url).send().await.unwrap();
        read_reply(response, "test").await
    }

    #[tokio::test]
    async fn test_read_reply_decodes_success() {
        let reply = read_from(200, VALID_REPLY).await.unwrap();
        assert_eq!(reply.id, "msg_1");
        assert_eq!(reply.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(reply.usage.input_tokens, 12);
    }

    #[tokio::test]
    async fn test_read_reply_rate_limited() {
        let result = read_from(429, r#"{"type":"error","error":{"type":"rate_limit_error"}}"#).await;
        assert!(matches!(result, Err(ModelError::RateLimited)));
    }

    #[tokio::test]
    async fn test_read_reply_auth_failures() {
        for status in [401, 403] {
            match read_from(status, "invalid x-api-key").await {
                Err(ModelError::Auth(message)) => assert!(message.contains("invalid x-api-key")),
                other => panic!("unexpected result for {}: {:?}", status, other),
            }
        }
    }

    #[tokio::test]
    async fn test_read_reply_api_error() {
        match read_from(500, "overloaded").await {
            Err(ModelError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_reply_undecodable_body() {
        match read_from(200, "<html>not json</html>").await {
            Err(ModelError::UnexpectedResponse(message)) => assert!(message.contains("cannot decode test reply")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
