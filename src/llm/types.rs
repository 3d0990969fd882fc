use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Fixed sampling configuration for routine analysis.
pub const ROUTINE_ANALYSIS_CONFIG: GenerationConfig = GenerationConfig {
    max_output_tokens: 2048,
    temperature: 0.7,
    top_p: 0.8,
    top_k: 40,
};

impl Default for GenerationConfig {
    fn default() -> Self {
        ROUTINE_ANALYSIS_CONFIG
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            prompt: prompt.into(),
            config,
        }
    }
}

/// A hosted text-generation service.
///
/// Implementations return the raw generated text; parsing is the caller's job.
/// Failures are reported as `SkincareError::ServiceInvocation`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Supported hosted providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Claude,
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAi => "gpt-4o",
            Provider::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Claude => "https://api.anthropic.com",
            Provider::OpenAi => "https://api.openai.com",
            Provider::OpenRouter => "https://openrouter.ai/api",
        }
    }

    /// Environment variable consulted when the keychain has no key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Keychain service name holding the provider's API key.
    pub fn keychain_service(&self) -> String {
        format!("buildmyskincare-{}-api", self.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(format!(
                "Unsupported AI provider: '{}'. Supported: gemini, claude, openai, openrouter",
                other
            )),
        }
    }
}
