//! watsonx.ai text-generation client.
//!
//! Issues `POST {endpoint}/ml/v1/text/generation?version=...` with a bearer credential and maps
//! HTTP outcomes onto [`GatewayError`] so the call policy can tell transient failures apart.

use super::{CompletionOptions, GatewayError, ModelCallResult, ModelGateway, TokenUsage};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERATION_PATH: &str = "/ml/v1/text/generation";

/// Model gateway backed by the watsonx.ai REST API.
pub struct WatsonxGateway {
    http: Client,
    endpoint: String,
    api_key: String,
    project_id: String,
    api_version: String,
}

impl WatsonxGateway {
    /// Build a client for the given deployment.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .user_agent(concat!("docrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| GatewayError::Transport(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            project_id: project_id.into(),
            api_version: api_version.into(),
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            config.watsonx_endpoint.clone(),
            config.watsonx_api_key.clone(),
            config.watsonx_project_id.clone(),
            config.watsonx_api_version.clone(),
        )
    }

    fn generation_url(&self) -> String {
        format!("{}{GENERATION_PATH}", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    project_id: &'a str,
    input: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    decoding_method: &'static str,
    max_new_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    results: Vec<GenerationResult>,
}

#[derive(Debug, Deserialize)]
struct GenerationResult {
    generated_text: String,
    #[serde(default)]
    input_token_count: u64,
    #[serde(default)]
    generated_token_count: u64,
}

#[async_trait]
impl ModelGateway for WatsonxGateway {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
        timeout: Duration,
    ) -> Result<ModelCallResult, GatewayError> {
        let payload = GenerationRequest {
            model_id: &options.model_id,
            project_id: &self.project_id,
            input: prompt,
            parameters: GenerationParameters {
                decoding_method: if options.temperature > 0.0 {
                    "sample"
                } else {
                    "greedy"
                },
                max_new_tokens: options.max_tokens,
                temperature: options.temperature,
            },
        };

        tracing::debug!(
            model = %options.model_id,
            max_tokens = options.max_tokens,
            prompt_chars = prompt.len(),
            "Sending generation request"
        );

        let response = self
            .http
            .post(self.generation_url())
            .query(&[("version", self.api_version.as_str())])
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    GatewayError::Timeout(timeout)
                } else {
                    GatewayError::Transport(format!(
                        "failed to reach watsonx.ai at {}: {error}",
                        self.endpoint
                    ))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerationResponse = response.json().await.map_err(|error| {
            GatewayError::InvalidResponse(format!("failed to decode watsonx.ai response: {error}"))
        })?;
        let model_id = body
            .model_id
            .unwrap_or_else(|| options.model_id.clone());
        let result = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::InvalidResponse("no results in response".into()))?;

        Ok(ModelCallResult {
            text: result.generated_text.trim().to_string(),
            token_usage: TokenUsage {
                prompt_tokens: result.input_token_count,
                completion_tokens: result.generated_token_count,
            },
            model_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn gateway(server: &MockServer) -> WatsonxGateway {
        WatsonxGateway::new(server.base_url(), "test-key", "project-1", "2024-01-01")
            .expect("client")
    }

    fn options() -> CompletionOptions {
        CompletionOptions {
            max_tokens: 64,
            temperature: 0.3,
            model_id: "ibm-granite/granite-13b-chat-v2".into(),
        }
    }

    #[tokio::test]
    async fn parses_successful_generation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(GENERATION_PATH)
                    .query_param("version", "2024-01-01")
                    .header("authorization", "Bearer test-key")
                    .json_body_partial(r#"{"project_id":"project-1","input":"Summarize"}"#);
                then.status(200).json_body(json!({
                    "model_id": "ibm-granite/granite-13b-chat-v2",
                    "results": [{
                        "generated_text": "  A short summary. ",
                        "input_token_count": 12,
                        "generated_token_count": 4,
                        "stop_reason": "eos_token"
                    }]
                }));
            })
            .await;

        let result = gateway(&server)
            .complete("Summarize", &options(), Duration::from_secs(5))
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(result.text, "A short summary.");
        assert_eq!(result.token_usage.prompt_tokens, 12);
        assert_eq!(result.token_usage.completion_tokens, 4);
    }

    #[tokio::test]
    async fn maps_unauthorized_to_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(GENERATION_PATH);
                then.status(401).body("expired token");
            })
            .await;

        let error = gateway(&server)
            .complete("Summarize", &options(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(error, GatewayError::Auth { status: 401 }));
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(GENERATION_PATH);
                then.status(503).body("overloaded");
            })
            .await;

        let error = gateway(&server)
            .complete("Summarize", &options(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(&error, GatewayError::Status { status: 503, body } if body == "overloaded"));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn empty_results_are_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(GENERATION_PATH);
                then.status(200).json_body(json!({ "results": [] }));
            })
            .await;

        let error = gateway(&server)
            .complete("Summarize", &options(), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(error, GatewayError::InvalidResponse(_)));
    }
}
