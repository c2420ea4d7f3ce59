//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint speaking the `/v1/chat/completions` protocol
//! (OpenAI, OpenRouter, vLLM, llama.cpp server, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::traits::{InferenceClient, InferenceRequest};
use crate::{KibitzError, Result};

/// Default base URL for the OpenAI API
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a client for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL (for proxies, or testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom base URL and call timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KibitzError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Check response status and map to appropriate error.
    async fn handle_response_errors(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(KibitzError::RateLimited { retry_after });
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);
        Err(match KibitzError::from_status(status.as_u16(), message) {
            KibitzError::Timeout(_) => KibitzError::Timeout(self.timeout),
            other => other,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> KibitzError {
        if err.is_timeout() {
            KibitzError::Timeout(self.timeout)
        } else {
            KibitzError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl InferenceClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = self.handle_response_errors(response).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(KibitzError::EmptyResponse)
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
