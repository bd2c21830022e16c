//! HttpBackend - REST transport to the assessment backend.
//!
//! Sends the start signal and user turns as JSON POSTs and normalizes the
//! replies. Configuration comes from [`BackendConfig`].

use crate::Backend;
use crate::error::TransportError;
use crate::normalize::normalize;
use async_trait::async_trait;
use parley_core::config::BackendConfig;
use parley_core::envelope::BackendReply;
use parley_core::session::SessionId;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Backend implementation that talks to the assessment HTTP API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    start_url: String,
    chat_url: String,
    auth_token: Option<String>,
}

impl HttpBackend {
    /// Creates a backend client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| TransportError::Network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            start_url: config.start_url(),
            chat_url: config.chat_url(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Overrides the bearer token after construction.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header("accept", "application/json")
            .json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        response.text().await.map_err(map_request_error)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn start(&self, begin_message: &str) -> Result<BackendReply, TransportError> {
        tracing::debug!(url = %self.start_url, "starting backend session");
        let body = self
            .post(&self.start_url, &StartRequest {
                message: begin_message,
            })
            .await?;

        let reply = normalize(&body)?;
        if reply.session_id.is_none() {
            return Err(TransportError::MissingSessionId);
        }
        Ok(reply)
    }

    async fn chat(&self, session_id: &SessionId, message: &str) -> Result<BackendReply, TransportError> {
        tracing::debug!(url = %self.chat_url, session_id = %session_id, "sending chat turn");
        let body = self
            .post(&self.chat_url, &ChatRequest {
                conversation_id: session_id.to_json(),
                message,
            })
            .await?;

        normalize(&body)
    }
}

#[derive(Serialize)]
struct StartRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    conversation_id: Value,
    message: &'a str,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

fn map_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

fn map_http_error(status: StatusCode, body: String) -> TransportError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|wrapper| {
            wrapper.message.or_else(|| match wrapper.error? {
                Value::String(s) => Some(s),
                Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(str::to_owned),
                _ => None,
            })
        })
        .unwrap_or_else(|| body.trim().to_string());

    TransportError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_extracted_from_json_body() {
        let err = map_http_error(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "Unauthenticated."}"#.to_string(),
        );
        assert_eq!(
            err,
            TransportError::Status {
                status: 401,
                message: "Unauthenticated.".into()
            }
        );
    }

    #[test]
    fn nested_error_object_is_understood() {
        let err = map_http_error(
            StatusCode::BAD_GATEWAY,
            r#"{"error": {"message": "upstream model failed"}}"#.to_string(),
        );
        assert!(matches!(
            err,
            TransportError::Status { status: 502, ref message } if message == "upstream model failed"
        ));
    }

    #[test]
    fn plain_text_error_body_is_kept() {
        let err = map_http_error(StatusCode::INTERNAL_SERVER_ERROR, " boom \n".to_string());
        assert!(matches!(
            err,
            TransportError::Status { status: 500, ref message } if message == "boom"
        ));
    }
}
