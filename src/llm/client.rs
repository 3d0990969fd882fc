//! HTTP client for hosted text-generation providers.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use super::types::{GenerationRequest, Provider, TextGenerator};
use crate::error::{Result, SkincareError};

const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str = "You are a skincare routine analysis assistant. Always respond with valid JSON only, no markdown formatting or code blocks.";

/// Text generator backed by a hosted LLM API.
pub struct LlmClient {
    provider: Provider,
    model: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: Provider, model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            http: build_api_client()?,
        })
    }

    /// Point the client at a different host (proxies, local gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.provider {
            Provider::Gemini => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            Provider::Claude => format!("{}/v1/messages", self.base_url),
            Provider::OpenAi | Provider::OpenRouter => {
                format!("{}/v1/chat/completions", self.base_url)
            }
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.provider {
            Provider::Gemini => builder.header("x-goog-api-key", &self.api_key),
            Provider::Claude => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            Provider::OpenAi | Provider::OpenRouter => {
                builder.header("Authorization", format!("Bearer {}", self.api_key))
            }
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let provider = self.provider.as_str();
        info!(
            "Requesting generation from provider '{}' model '{}' ({} prompt chars)",
            provider,
            self.model,
            request.prompt.len()
        );

        let body = build_request_body(self.provider, &self.model, request);
        let response = self
            .authorize(self.http.post(self.endpoint()))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let msg = if e.is_timeout() {
                    format!(
                        "LLM API timeout after {}s for provider '{}'",
                        REQUEST_TIMEOUT_SECS, provider
                    )
                } else {
                    format!("LLM API request failed for {}: {}", provider, e)
                };
                error!("{}", msg);
                SkincareError::ServiceInvocation(msg)
            })?;

        let body_text = handle_api_response(response, provider).await?;
        let resp_json: Value = serde_json::from_str(&body_text).map_err(|e| {
            let msg = format!("Failed to parse {} API response wrapper: {}", provider, e);
            error!("{}", msg);
            SkincareError::ServiceInvocation(msg)
        })?;

        extract_text(self.provider, &resp_json)
    }
}

/// Build a reqwest client with a 60-second timeout for LLM API calls.
fn build_api_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| SkincareError::ServiceInvocation(format!("Failed to build HTTP client: {}", e)))
}

/// Map the sampling config onto each provider's request format.
///
/// OpenAI has no top-k parameter; it is left out there.
pub(crate) fn build_request_body(provider: Provider, model: &str, request: &GenerationRequest) -> Value {
    let config = &request.config;
    match provider {
        Provider::Gemini => json!({
            "contents": [
                {"role": "user", "parts": [{"text": request.prompt}]}
            ],
            "generationConfig": {
                "maxOutputTokens": config.max_output_tokens,
                "temperature": config.temperature,
                "topP": config.top_p,
                "topK": config.top_k
            }
        }),
        Provider::Claude => json!({
            "model": model,
            "max_tokens": config.max_output_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "top_k": config.top_k,
            "system": SYSTEM_PROMPT,
            "messages": [
                {"role": "user", "content": request.prompt}
            ]
        }),
        Provider::OpenAi => json!({
            "model": model,
            "max_tokens": config.max_output_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": request.prompt}
            ],
            "response_format": {"type": "json_object"}
        }),
        Provider::OpenRouter => json!({
            "model": model,
            "max_tokens": config.max_output_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "top_k": config.top_k,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": request.prompt}
            ],
            "response_format": {"type": "json_object"}
        }),
    }
}

/// Pull the generated text out of a provider's response wrapper.
pub(crate) fn extract_text(provider: Provider, resp_json: &Value) -> Result<String> {
    let text = match provider {
        // { "candidates": [{"content": {"parts": [{"text": "..."}]}}] }
        Provider::Gemini => resp_json["candidates"][0]["content"]["parts"][0]["text"].as_str(),
        // { "content": [{"type": "text", "text": "..."}] }
        Provider::Claude => resp_json["content"][0]["text"].as_str(),
        // { "choices": [{"message": {"content": "..."}}] }
        Provider::OpenAi | Provider::OpenRouter => {
            resp_json["choices"][0]["message"]["content"].as_str()
        }
    };

    text.map(|s| s.to_string()).ok_or_else(|| {
        let msg = format!("No text content in {} API response", provider);
        error!("{}", msg);
        SkincareError::ServiceInvocation(msg)
    })
}

/// Handle API response: check status and extract body text.
async fn handle_api_response(response: reqwest::Response, provider: &str) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        let truncated = if body.chars().count() > 1024 {
            format!("{}...", body.chars().take(1024).collect::<String>())
        } else {
            body
        };
        let msg = format!("LLM API error: {} from {} - {}", status, provider, truncated);
        error!("{}", msg);
        return Err(SkincareError::ServiceInvocation(msg));
    }
    response.text().await.map_err(|e| {
        SkincareError::ServiceInvocation(format!(
            "Failed to read API response body from {}: {}",
            provider, e
        ))
    })
}
