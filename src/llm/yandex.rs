//! YandexGPT foundation models client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{CompletionClient, CompletionOptions};
use crate::config::CompletionConfig;

/// Client for the `foundationModels/v1/completion` endpoint.
pub struct YandexGptClient {
    client: Client,
    config: CompletionConfig,
}

impl YandexGptClient {
    /// Create a new client. The configured timeout applies to every request.
    pub fn new(config: CompletionConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::network_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn build_request(&self, prompt: &str, options: CompletionOptions) -> CompletionRequest {
        CompletionRequest {
            model_uri: self.config.model_uri(),
            completion_options: WireOptions {
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            },
            messages: vec![WireMessage {
                role: "user".to_string(),
                text: prompt.to_string(),
            }],
        }
    }

    /// Execute a single request.
    async fn execute_request(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let response = match self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Api-Key {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .header("x-folder-id", &self.config.folder_id)
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(LlmError::timeout(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::timeout(format!("Timed out reading response body: {}", e))
            } else {
                LlmError::network_error(format!("Failed to read response body: {}", e))
            }
        })?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        parse_envelope(&body)
    }
}

#[async_trait]
impl CompletionClient for YandexGptClient {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String, LlmError> {
        let request = self.build_request(prompt, options);

        tracing::debug!(
            "Sending completion request: model={}, max_tokens={}",
            request.model_uri,
            options.max_tokens
        );

        match self.execute_request(&request).await {
            Ok(text) => Ok(text),
            Err(error) => {
                tracing::error!("Completion request failed: {}", error);
                Err(error)
            }
        }
    }
}

/// Pull `result.alternatives[0].message.text` out of a response body.
fn parse_envelope(body: &str) -> Result<String, LlmError> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::invalid_envelope(format!("Failed to parse response: {}, body: {}", e, body))
    })?;

    let alternative = parsed
        .result
        .alternatives
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::invalid_envelope("No alternatives in response".to_string()))?;

    Ok(alternative.message.text.trim().to_string())
}

/// Completion request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    model_uri: String,
    completion_options: WireOptions,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOptions {
    temperature: f64,
    max_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(default)]
    role: String,
    text: String,
}

/// Completion response format.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Debug, Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: WireMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn config(url: &str) -> CompletionConfig {
        CompletionConfig {
            api_key: "secret".to_string(),
            folder_id: "b1gfolder".to_string(),
            url: url.to_string(),
            model: "yandexgpt-lite/latest".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    type SeenHeaders = Arc<Mutex<Option<HeaderMap>>>;

    /// Serve `POST /completion` with a fixed status and body, remembering the
    /// headers of the last request.
    async fn completion_endpoint(status: StatusCode, body: &'static str) -> (String, SeenHeaders) {
        let seen: SeenHeaders = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/completion",
            post(move |headers: HeaderMap| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(headers);
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}/completion", addr), seen)
    }

    /// Accept one connection, read the request, write `head` and then stall.
    async fn stalling_endpoint(head: &'static [u8]) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(head).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        format!("http://{}/completion", addr)
    }

    fn short_timeout(url: &str) -> CompletionConfig {
        CompletionConfig {
            timeout: Duration::from_millis(500),
            ..config(url)
        }
    }

    #[test]
    fn request_body_matches_wire_format() {
        let client = YandexGptClient::new(config("http://localhost")).unwrap();
        let request = client.build_request(
            "extract this",
            CompletionOptions {
                temperature: 0.1,
                max_tokens: 100,
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "modelUri": "gpt://b1gfolder/yandexgpt-lite/latest",
                "completionOptions": {"temperature": 0.1, "maxTokens": 100},
                "messages": [{"role": "user", "text": "extract this"}]
            })
        );
    }

    #[test]
    fn envelope_text_is_trimmed() {
        let body = r#"{"result": {"alternatives": [
            {"message": {"role": "assistant", "text": "  ```{\"tasks\": []}```\n"}, "status": "ALTERNATIVE_STATUS_FINAL"}
        ], "usage": {"inputTextTokens": "10"}, "modelVersion": "23.10.2024"}}"#;
        assert_eq!(parse_envelope(body).unwrap(), "```{\"tasks\": []}```");
    }

    #[test]
    fn envelope_without_alternatives_is_rejected() {
        let err = parse_envelope(r#"{"result": {"alternatives": []}}"#).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::InvalidEnvelope);

        let err = parse_envelope("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::InvalidEnvelope);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        // Nothing listens on the loopback discard port.
        let client = YandexGptClient::new(config("http://127.0.0.1:9/completion")).unwrap();
        let err = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::NetworkError);
        assert!(err.status_code.is_none());
    }

    #[tokio::test]
    async fn sends_api_key_and_folder_headers() {
        let (url, seen) = completion_endpoint(
            StatusCode::OK,
            r#"{"result": {"alternatives": [{"message": {"role": "assistant", "text": " ok "}}]}}"#,
        )
        .await;
        let client = YandexGptClient::new(config(&url)).unwrap();

        let reply = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(reply, "ok");

        let headers = seen.lock().unwrap().clone().expect("request reached the endpoint");
        assert_eq!(headers["authorization"], "Api-Key secret");
        assert_eq!(headers["x-folder-id"], "b1gfolder");
        assert_eq!(headers["content-type"], "application/json");
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let (url, _) = completion_endpoint(StatusCode::UNAUTHORIZED, "Unknown api key").await;
        let client = YandexGptClient::new(config(&url)).unwrap();
        let err = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ClientError);
        assert_eq!(err.status_code, Some(401));
        assert_eq!(err.message, "Unknown api key");

        let (url, _) = completion_endpoint(StatusCode::SERVICE_UNAVAILABLE, "overloaded").await;
        let client = YandexGptClient::new(config(&url)).unwrap();
        let err = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ServerError);
        assert_eq!(err.status_code, Some(503));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let url = stalling_endpoint(b"").await;
        let client = YandexGptClient::new(short_timeout(&url)).unwrap();
        let err = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Timeout);
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        // Head arrives in time, the promised body never does.
        let url = stalling_endpoint(
            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"result\"",
        )
        .await;
        let client = YandexGptClient::new(short_timeout(&url)).unwrap();
        let err = client
            .complete("hello", CompletionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Timeout, "got {}", err);
        assert!(err.is_timeout());
    }
}
