use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::TranscriptionConfig;

/// Style transcript produced from the source lecture video.
///
/// Only the joined text is used downstream, as a tone exemplar for narration
/// prompts. Per-segment timestamps are discarded on purpose.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Full transcript text, segment texts joined with single spaces
    pub text: String,
    /// Path of the persisted transcript.txt artifact
    pub text_path: PathBuf,
}

impl Transcript {
    /// Bounded prefix of the transcript used as the style exemplar,
    /// truncated on a char boundary.
    pub fn style_sample(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => &self.text[..byte_idx],
            None => &self.text,
        }
    }
}

/// Video transcriber backed by a local Whisper command-line tool.
#[derive(Debug, Clone)]
pub struct Transcriber {
    config: TranscriptionConfig,
}

impl Transcriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }

    /// Transcribe the source video's audio track into a style transcript.
    ///
    /// Fatal on failure: narration tone depends on this stage, so errors
    /// propagate to the caller uncaught.
    pub async fn transcribe_video(&self, video_path: &Path, output_dir: &Path) -> Result<Transcript> {
        info!("🎤 Transcribing source video: {}", video_path.display());
        info!("⚙️  Whisper model: {}", self.config.model);

        let temp_dir = output_dir.join("temp_whisper");
        tokio::fs::create_dir_all(&temp_dir).await?;

        let whisper_output = self.run_whisper_command(video_path, &temp_dir).await?;

        let text = whisper_output
            .segment_texts()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let text_path = output_dir.join("transcript.txt");
        tokio::fs::write(&text_path, &text).await?;
        info!(
            "💾 Transcript saved: {} ({} characters)",
            text_path.display(),
            text.len()
        );

        let _ = tokio::fs::remove_dir_all(&temp_dir).await;

        Ok(Transcript { text, text_path })
    }

    /// Run a Whisper command-line tool with automatic backend detection.
    async fn run_whisper_command(&self, media_path: &Path, output_dir: &Path) -> Result<WhisperOutput> {
        let backends = [
            ("whisper-cli", true), // whisper.cpp via Homebrew (fastest)
            ("whisper-cpp", true), // whisper.cpp
            ("whisper", false),    // Python OpenAI Whisper (fallback)
        ];

        for (cmd_name, is_cpp) in &backends {
            if Self::check_command_available(cmd_name).await {
                info!("✅ Using {} backend for transcription", cmd_name);
                return if *is_cpp {
                    self.run_whisper_cpp_command(cmd_name, media_path, output_dir).await
                } else {
                    self.run_python_whisper_command(media_path, output_dir).await
                };
            }
            debug!("{} not available", cmd_name);
        }

        error!("❌ No Whisper backend found");
        Err(anyhow!(
            "No Whisper backend found. Please install whisper.cpp or openai-whisper"
        ))
    }

    async fn run_whisper_cpp_command(
        &self,
        cmd_name: &str,
        media_path: &Path,
        output_dir: &Path,
    ) -> Result<WhisperOutput> {
        let base_name = media_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let output_file = output_dir.join(&base_name);

        let mut cmd = Command::new(cmd_name);
        cmd.arg("-f")
            .arg(media_path)
            .arg("-oj")
            .arg("-of")
            .arg(&output_file)
            .arg("-m")
            .arg(format!("models/ggml-{}.bin", self.config.model));

        if let Some(language) = &self.config.language {
            cmd.arg("-l").arg(language);
        }

        info!(
            "🚀 Running {}: {} model on {}",
            cmd_name,
            self.config.model,
            media_path.display()
        );

        self.execute_and_parse(cmd, output_dir, cmd_name).await
    }

    async fn run_python_whisper_command(
        &self,
        media_path: &Path,
        output_dir: &Path,
    ) -> Result<WhisperOutput> {
        let mut cmd = Command::new("whisper");
        cmd.arg(media_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False")
            .arg("--fp16")
            .arg("False");

        if let Some(language) = &self.config.language {
            cmd.arg("--language").arg(language);
        }

        info!(
            "🚀 Running Python Whisper: {} model on {}",
            self.config.model,
            media_path.display()
        );

        self.execute_and_parse(cmd, output_dir, "whisper").await
    }

    async fn execute_and_parse(
        &self,
        mut cmd: Command,
        output_dir: &Path,
        backend_name: &str,
    ) -> Result<WhisperOutput> {
        let timeout_duration = Duration::from_secs(self.config.timeout as u64);

        let output = match tokio::time::timeout(timeout_duration, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    "⏰ {} timed out after {} seconds",
                    backend_name, self.config.timeout
                );
                return Err(anyhow!(
                    "{} timed out after {} seconds",
                    backend_name,
                    self.config.timeout
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("❌ {} failed: {}", backend_name, stderr.trim());
            return Err(anyhow!(
                "{} transcription failed with exit code: {}",
                backend_name,
                output.status
            ));
        }

        let json_files = self.find_output_files(output_dir, "json").await?;
        let json_path = json_files
            .first()
            .ok_or_else(|| anyhow!("No {} JSON output found", backend_name))?;

        let json_content = tokio::fs::read_to_string(json_path).await?;
        serde_json::from_str::<WhisperOutput>(&json_content)
            .map_err(|e| anyhow!("Failed to parse {} JSON output: {}", backend_name, e))
    }

    async fn find_output_files(&self, dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == extension) {
                files.push(path);
            }
        }

        Ok(files)
    }

    async fn check_command_available(cmd_name: &str) -> bool {
        Command::new(cmd_name)
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Check if any Whisper backend is installed.
    pub async fn check_availability() -> Result<String> {
        let backends = [
            ("whisper-cli", "whisper.cpp (C++ implementation)"),
            ("whisper-cpp", "whisper.cpp (C++ implementation)"),
            ("whisper", "OpenAI Whisper (Python implementation)"),
        ];

        for (cmd_name, description) in &backends {
            if Self::check_command_available(cmd_name).await {
                return Ok(format!("{} available", description));
            }
        }

        Err(anyhow!(
            "No Whisper backend found. Please install:\n\
            - whisper.cpp (recommended): https://github.com/ggerganov/whisper.cpp\n\
            - Or OpenAI Whisper: pip install openai-whisper"
        ))
    }
}

/// Whisper JSON output. Both whisper.cpp formats and the Python format are
/// accepted; only segment text is consumed.
#[derive(Debug, Clone, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    transcription: Vec<WhisperTranscriptionSegment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperSegment {
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperTranscriptionSegment {
    text: String,
}

impl WhisperOutput {
    fn segment_texts(&self) -> impl Iterator<Item = &str> {
        let cpp = self.transcription.iter().map(|s| s.text.as_str());
        let python = self.segments.iter().map(|s| s.text.as_str());
        cpp.chain(python)
    }
}
