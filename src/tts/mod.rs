pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::SpeechConfig;

/// Trait for hosted speech-synthesis collaborators.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the configured voice and write a playable
    /// audio artifact at `output_path`.
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;
}

/// Per-slide synthesis outcome.
///
/// Failed syntheses stay in the list as tagged entries instead of being
/// silently omitted, so per-slide collections remain index-aligned and
/// downstream stages can detect the gap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SynthesisOutcome {
    Synthesized { path: PathBuf },
    Failed { reason: String },
}

impl SynthesisOutcome {
    pub fn is_synthesized(&self) -> bool {
        matches!(self, Self::Synthesized { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Synthesized { path } => Some(path),
            Self::Failed { .. } => None,
        }
    }
}

/// Converts narration scripts into per-slide audio clips.
///
/// Calls are awaited one at a time; a failed slide is logged and recorded,
/// not retried, and does not abort the batch.
pub struct Narrator {
    synthesizer: Box<dyn SpeechSynthesizer>,
}

impl Narrator {
    pub fn new(config: &SpeechConfig, fallback_api_key: Option<&str>) -> Result<Self> {
        let synthesizer = providers::HttpSpeechProvider::new(config, fallback_api_key)?;
        Ok(Self {
            synthesizer: Box::new(synthesizer),
        })
    }

    /// Construct with an explicit synthesizer. Used by tests.
    pub fn with_synthesizer(synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        Self { synthesizer }
    }

    /// Synthesize narration audio for each script, writing
    /// `slide_audio_<n>.mp3` with 1-based numbering.
    ///
    /// Returns one outcome per script, in script order.
    pub async fn narrate(&self, scripts: &[String], output_dir: &Path) -> Result<Vec<SynthesisOutcome>> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut outcomes = Vec::with_capacity(scripts.len());
        for (i, script) in scripts.iter().enumerate() {
            let index = i + 1;
            let output_path = output_dir.join(format!("slide_audio_{}.mp3", index));

            match self.synthesizer.synthesize(script, &output_path).await {
                Ok(()) => {
                    info!("✅ Slide {} audio generated.", index);
                    outcomes.push(SynthesisOutcome::Synthesized { path: output_path });
                }
                Err(e) => {
                    warn!("❌ Audio error on slide {}: {}", index, e);
                    outcomes.push(SynthesisOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let synthesized = outcomes.iter().filter(|o| o.is_synthesized()).count();
        info!(
            "🔊 Speech synthesis finished: {}/{} clips",
            synthesized,
            scripts.len()
        );

        Ok(outcomes)
    }
}

/// Collect the paths of successful outcomes, in order.
pub fn synthesized_paths(outcomes: &[SynthesisOutcome]) -> Vec<PathBuf> {
    outcomes
        .iter()
        .filter_map(|o| o.path().map(Path::to_path_buf))
        .collect()
}

/// 1-based slide numbers whose synthesis failed, in order.
///
/// Stages that consume per-slide audio must check this before compacting the
/// outcome list: dropping a failed slide would shift every later clip against
/// its slide number.
pub fn failed_slides(outcomes: &[SynthesisOutcome]) -> Vec<usize> {
    outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.is_synthesized())
        .map(|(i, _)| i + 1)
        .collect()
}
