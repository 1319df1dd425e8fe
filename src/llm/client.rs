//! Chat-completion capability and its OpenAI-compatible HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::core::config::LlmSettings;
use crate::core::error::{RemoteErrorKind, RemoteServiceError};

/// One system + user exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Ask the endpoint to constrain output to a JSON object.
    pub want_json: bool,
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Raw text of the first choice.
    async fn complete(&self, request: &ChatRequest) -> Result<String, RemoteServiceError>;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenAiChatClient
// ---------------------------------------------------------------------------

/// Posts to `{base_url}/chat/completions` with bearer auth.
#[derive(Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(http, &settings.base_url, &settings.api_key))
    }

    pub fn with_client(http: reqwest::Client, base_url: &Url, api_key: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.as_str().trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RemoteServiceError> {
        let body = WireRequest {
            model: &request.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            response_format: request.want_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        debug!(
            "chat.completions → {} (model={}, json={})",
            self.endpoint, request.model, request.want_json
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RemoteServiceError::new(
                    RemoteErrorKind::Transport,
                    format!("chat.completions request failed: {}", e),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &text));
        }

        // A body cut off mid-stream is a transport failure, not a bad payload.
        let bytes = response.bytes().await.map_err(|e| {
            RemoteServiceError::new(
                RemoteErrorKind::Transport,
                format!("chat.completions response body read failed: {}", e),
            )
        })?;
        let value: WireResponse = serde_json::from_slice(&bytes).map_err(|e| {
            RemoteServiceError::new(
                RemoteErrorKind::InvalidResponse,
                format!("chat.completions response parse failed: {}", e),
            )
        })?;

        value
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                RemoteServiceError::new(
                    RemoteErrorKind::InvalidResponse,
                    "chat.completions response had no message content",
                )
            })
    }
}

fn status_error(status: u16, body: &str) -> RemoteServiceError {
    let kind = match status {
        401 | 403 => RemoteErrorKind::Authentication,
        429 | 500..=599 => RemoteErrorKind::Unavailable(status),
        _ => RemoteErrorKind::Rejected(status),
    };

    // OpenAI-style `{"error": {"message": ...}}` when available, raw body otherwise.
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(500).collect());

    RemoteServiceError::new(kind, format!("status={} {}", status, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiChatClient {
        let base = Url::parse(&format!("{}/v1", server.uri())).unwrap();
        OpenAiChatClient::with_client(reqwest::Client::new(), &base, "test-key")
    }

    fn request(want_json: bool) -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            system_prompt: "sys".into(),
            user_prompt: "hello".into(),
            want_json,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[test]
    fn endpoint_joins_base_url() {
        let base = Url::parse("https://llm.example.com/v1/").unwrap();
        let c = OpenAiChatClient::with_client(reqwest::Client::new(), &base, "k");
        assert_eq!(c.endpoint(), "https://llm.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn sends_json_mode_and_auth() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/chat/completions"))
            .and(matchers::header("authorization", "Bearer test-key"))
            .and(matchers::body_partial_json(json!({
                "model": "test-model",
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"title\":\"X\"}")))
            .expect(1)
            .mount(&server)
            .await;

        let out = client_for(&server).complete(&request(true)).await.unwrap();
        assert_eq!(out, "{\"title\":\"X\"}");
    }

    #[tokio::test]
    async fn free_form_request_omits_response_format() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("plain answer")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.complete(&request(false)).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#,
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request(true)).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Authentication);
        assert!(err.message.contains("Invalid API key"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_and_rate_limits_are_transient() {
        for status in [429u16, 500, 503] {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("busy"))
                .mount(&server)
                .await;

            let err = client_for(&server).complete(&request(false)).await.unwrap_err();
            assert_eq!(err.kind, RemoteErrorKind::Unavailable(status));
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn missing_content_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request(false)).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete(&request(false)).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::InvalidResponse);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn truncated_body_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 1000 bytes, sends a few, then hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 1000\r\n\r\n{\"choices\": [",
                )
                .await;
            let _ = socket.shutdown().await;
        });

        let base = Url::parse(&format!("http://{}/v1", addr)).unwrap();
        let client = OpenAiChatClient::with_client(reqwest::Client::new(), &base, "k");
        let err = client.complete(&request(false)).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Transport);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Nothing listens on port 9 (discard) in test environments.
        let base = Url::parse("http://127.0.0.1:9/v1").unwrap();
        let client = OpenAiChatClient::with_client(reqwest::Client::new(), &base, "k");
        let err = client.complete(&request(false)).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Transport);
        assert!(err.is_transient());
    }
}
