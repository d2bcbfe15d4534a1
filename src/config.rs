use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::llm::LLMProvider;

/// Configuration for the slidecast pipeline.
///
/// Every component receives its section explicitly at construction time;
/// there is no module-level client or implicit global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcription (style transcript) settings
    pub transcription: TranscriptionConfig,

    /// Slide extraction settings
    pub slides: SlideConfig,

    /// Narration script generation (LLM) settings
    pub llm: LLMConfig,

    /// Speech synthesis settings
    pub speech: SpeechConfig,

    /// Video assembly settings
    pub assembly: AssemblyConfig,

    /// Interactive assistant settings
    pub assistant: AssistantConfig,

    /// Output and artifact settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model name (tiny, base, small, ...)
    pub model: String,

    /// Language hint for transcription
    pub language: Option<String>,

    /// Timeout for the transcription command (seconds)
    pub timeout: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideConfig {
    /// Rasterization resolution in DPI (pdftoppm -r)
    pub dpi: u32,

    /// OCR language passed to tesseract (-l)
    pub ocr_language: String,
}

/// LLM settings for narration script generation and assistant answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// LLM provider to use
    pub provider: LLMProvider,

    /// API endpoint (for LMStudio and custom providers)
    pub endpoint: Option<String>,

    /// API key (for cloud providers)
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Maximum number of transcript characters embedded as the style exemplar
    pub style_sample_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Speech synthesis endpoint (OpenAI-compatible /v1/audio/speech)
    pub endpoint: String,

    /// API key for the synthesis service; falls back to the LLM key when unset
    pub api_key: Option<String>,

    /// Synthesis model
    pub model: String,

    /// Fixed voice identity for all narration clips
    pub voice: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Output frame rate; 1 fps is appropriate for static slides with voice-over
    pub fps: u32,

    /// Normalize all slides to a canonical resolution before concatenation.
    /// Off by default: the upstream behavior leaves differing slide
    /// dimensions unreconciled.
    pub normalize_resolution: bool,

    /// Canonical resolution used when normalization is enabled
    pub canonical_width: u32,
    pub canonical_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Topic resolution mode
    pub topic_mode: TopicMode,

    /// Static time bands: (start seconds, topic label), sorted by start.
    pub bands: Vec<TopicBand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TopicMode {
    /// Hardcoded time-range-to-topic bands (upstream behavior)
    Bands,
    /// Binary search over the timeline's cumulative slide offsets
    Timeline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicBand {
    /// Inclusive start of the band in seconds
    pub start: f64,
    /// Topic label for this band
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory for all artifacts
    pub base_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Save the per-run pipeline report as JSON
    pub save_report: bool,
}

impl Config {
    /// Load configuration from file, falling back to environment variables.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "slidecast.toml",
            "config/slidecast.toml",
            "~/.config/slidecast/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env_overrides();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply SLIDECAST_* environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("SLIDECAST_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Ok(api_key) = std::env::var("SLIDECAST_TTS_API_KEY") {
            self.speech.api_key = Some(api_key);
        }

        if let Ok(model) = std::env::var("SLIDECAST_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(voice) = std::env::var("SLIDECAST_VOICE") {
            self.speech.voice = voice;
        }

        if let Ok(output_dir) = std::env::var("SLIDECAST_OUTPUT_DIR") {
            self.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(log_level) = std::env::var("SLIDECAST_LOG_LEVEL") {
            self.output.log_level = log_level;
        }
    }

    /// Save configuration to file.
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration. Must pass before any collaborator is contacted.
    pub fn validate(&self) -> Result<()> {
        // The LLM credential is the one required secret. Cloud providers must
        // not be called with a null credential.
        match self.llm.provider {
            LLMProvider::OpenAI => {
                if self.llm.api_key.as_deref().map_or(true, |k| k.is_empty()) {
                    return Err(PipelineError::Configuration(
                        "LLM API key is not set (SLIDECAST_API_KEY or [llm] api_key)".to_string(),
                    )
                    .into());
                }
            }
            LLMProvider::LMStudio => {
                if self.llm.endpoint.is_none() {
                    return Err(PipelineError::Configuration(
                        "LMStudio endpoint is not configured".to_string(),
                    )
                    .into());
                }
            }
        }

        if self.assembly.fps == 0 {
            return Err(anyhow!("assembly.fps must be greater than 0"));
        }

        if self.slides.dpi == 0 {
            return Err(anyhow!("slides.dpi must be greater than 0"));
        }

        if self.assistant.topic_mode == TopicMode::Bands && self.assistant.bands.is_empty() {
            return Err(anyhow!("assistant.bands must not be empty in Bands mode"));
        }

        // Topic lookup binary-searches over band starts; an unsorted table
        // from the config file would silently misresolve topics.
        if self
            .assistant
            .bands
            .windows(2)
            .any(|pair| pair[0].start > pair[1].start)
        {
            return Err(anyhow!("assistant.bands must be sorted by start time"));
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary.
    pub fn summary(&self) -> String {
        format!(
            "Slidecast Configuration:\n\
            - Whisper Model: {}\n\
            - Slide DPI: {}\n\
            - LLM Provider: {:?} ({})\n\
            - Voice: {}\n\
            - Frame Rate: {} fps\n\
            - Output Directory: {}",
            self.transcription.model,
            self.slides.dpi,
            self.llm.provider,
            self.llm.model,
            self.speech.voice,
            self.assembly.fps,
            self.output.base_dir.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcription: TranscriptionConfig {
                model: "base".to_string(),
                language: None,
                timeout: 3600, // large lecture videos transcribe slowly on CPU
            },
            slides: SlideConfig {
                dpi: 150,
                ocr_language: "eng".to_string(),
            },
            llm: LLMConfig {
                provider: LLMProvider::OpenAI,
                endpoint: None,
                api_key: None,
                model: "gpt-4".to_string(),
                max_tokens: 1024,
                temperature: 0.7,
                timeout_seconds: 120,
                style_sample_chars: 1500,
            },
            speech: SpeechConfig {
                endpoint: "https://api.openai.com/v1/audio/speech".to_string(),
                api_key: None,
                model: "tts-1".to_string(),
                voice: "alloy".to_string(),
                timeout_seconds: 120,
            },
            assembly: AssemblyConfig {
                fps: 1,
                normalize_resolution: false,
                canonical_width: 1280,
                canonical_height: 720,
            },
            assistant: AssistantConfig {
                topic_mode: TopicMode::Bands,
                bands: vec![
                    TopicBand {
                        start: 0.0,
                        topic: "Introduction".to_string(),
                    },
                    TopicBand {
                        start: 600.0,
                        topic: "Main Concepts".to_string(),
                    },
                    TopicBand {
                        start: 1200.0,
                        topic: "Summary".to_string(),
                    },
                ],
            },
            output: OutputConfig {
                base_dir: PathBuf::from("./output"),
                log_level: "info".to_string(),
                save_report: true,
            },
        }
    }
}

/// Configuration builder for programmatic config creation.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.llm.api_key = Some(api_key);
        self
    }

    pub fn with_llm_model(mut self, model: String) -> Self {
        self.config.llm.model = model;
        self
    }

    pub fn with_voice(mut self, voice: String) -> Self {
        self.config.speech.voice = voice;
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_topic_mode(mut self, mode: TopicMode) -> Self {
        self.config.assistant.topic_mode = mode;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.config.assembly.fps = fps;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
