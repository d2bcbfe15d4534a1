use super::{ChatMessage, LLM, LLMProvider, LLMResponse};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LLMConfig;

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("OpenAI API key required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;

        let request = OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or("https://api.openai.com/v1/chat/completions");

        debug!("Sending request to OpenAI API");

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }

        let openai_response: OpenAIResponse = response.json().await?;

        let content = openai_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No response from OpenAI"))?
            .message
            .content
            .clone();

        let tokens_used = openai_response.usage.map(|u| u.total_tokens);

        Ok(LLMResponse {
            content,
            tokens_used,
        })
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::OpenAI
    }
}

/// LMStudio provider implementation (local OpenAI-compatible server)
pub struct LMStudioProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct LMStudioRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct LMStudioResponse {
    choices: Vec<LMStudioChoice>,
    usage: Option<LMStudioUsage>,
}

#[derive(Debug, Deserialize)]
struct LMStudioChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct LMStudioUsage {
    total_tokens: u32,
}

impl LMStudioProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for LMStudioProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("LMStudio endpoint not configured"))?;

        let request = LMStudioRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending request to LMStudio at {}", endpoint);

        let response = self.client.post(endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LMStudio API error {}: {}", status, text));
        }

        let llm_response: LMStudioResponse = response.json().await?;

        let content = llm_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No response from LMStudio"))?
            .message
            .content
            .clone();

        let tokens_used = llm_response.usage.map(|u| u.total_tokens);

        Ok(LLMResponse {
            content,
            tokens_used,
        })
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_openai_provider_requires_key() {
        let config = Config::default().llm;
        assert!(OpenAIProvider::new(config).is_err());
    }

    #[test]
    fn test_lmstudio_provider_builds_without_key() {
        let mut config = Config::default().llm;
        config.provider = LLMProvider::LMStudio;
        config.endpoint = Some("http://localhost:1234/v1/chat/completions".to_string());
        assert!(LMStudioProvider::new(config).is_ok());
    }
}
