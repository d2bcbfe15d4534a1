use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::SpeechSynthesizer;
use crate::config::SpeechConfig;

/// Hosted speech-synthesis provider (OpenAI-compatible /v1/audio/speech).
pub struct HttpSpeechProvider {
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl HttpSpeechProvider {
    /// Build a provider from config. The synthesis service shares the LLM
    /// credential when no dedicated key is configured.
    pub fn new(config: &SpeechConfig, fallback_api_key: Option<&str>) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .or(fallback_api_key)
            .ok_or_else(|| anyhow!("Speech synthesis API key required"))?
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            client,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechProvider {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
        };

        debug!(
            "Sending synthesis request ({} chars, voice {})",
            text.len(),
            self.voice
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Speech API error {}: {}", status, text));
        }

        let audio_bytes = response.bytes().await?;
        if audio_bytes.is_empty() {
            return Err(anyhow!("Speech API returned empty audio"));
        }

        tokio::fs::write(output_path, &audio_bytes).await?;
        debug!(
            "Wrote {} bytes to {}",
            audio_bytes.len(),
            output_path.display()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_provider_requires_some_key() {
        let config = Config::default().speech;
        assert!(HttpSpeechProvider::new(&config, None).is_err());
    }

    #[test]
    fn test_provider_falls_back_to_llm_key() {
        let config = Config::default().speech;
        let provider = HttpSpeechProvider::new(&config, Some("sk-test")).unwrap();
        assert_eq!(provider.api_key, "sk-test");
        assert_eq!(provider.voice, "alloy");
    }

    #[test]
    fn test_dedicated_key_wins() {
        let mut config = Config::default().speech;
        config.api_key = Some("sk-tts".to_string());
        let provider = HttpSpeechProvider::new(&config, Some("sk-llm")).unwrap();
        assert_eq!(provider.api_key, "sk-tts");
    }
}
