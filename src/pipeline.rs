use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::assembly::VideoAssembler;
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::LLM;
use crate::script::ScriptGenerator;
use crate::slides::SlideExtractor;
use crate::timeline::{Timeline, TimelineBuilder};
use crate::transcription::Transcriber;
use crate::tts::{synthesized_paths, Narrator, SpeechSynthesizer, SynthesisOutcome};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PipelineStage {
    Transcription,
    SlideExtraction,
    ScriptGeneration,
    SpeechSynthesis,
    TimelineComputation,
    VideoAssembly,
}

/// Timing record for one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub duration: Duration,
}

/// Report for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub slide_count: usize,
    pub synthesized_count: usize,
    pub transcript_path: PathBuf,
    pub final_video_path: PathBuf,
    pub timeline: Timeline,
    pub outcomes: Vec<SynthesisOutcome>,
    pub total_time: Duration,
    pub stages: Vec<StageTiming>,
}

/// Runs the full batch pipeline: transcription, slide extraction, script
/// generation, speech synthesis, timeline computation, video assembly.
///
/// Strictly sequential; each stage is idempotent given the same inputs and
/// writes its outputs to well-known file names under the output directory.
/// There is no checkpointing: a failed run restarts from the beginning.
pub struct PipelineRunner {
    config: Config,
    transcriber: Transcriber,
    slide_extractor: SlideExtractor,
    script_generator: ScriptGenerator,
    narrator: Narrator,
    timeline_builder: TimelineBuilder,
    assembler: VideoAssembler,
}

impl PipelineRunner {
    /// Build a runner with collaborators constructed from configuration.
    /// The configuration must already be validated.
    pub fn new(config: Config) -> Result<Self> {
        let script_generator = ScriptGenerator::new(&config.llm)?;
        let narrator = Narrator::new(&config.speech, config.llm.api_key.as_deref())?;
        Ok(Self::assemble(config, script_generator, narrator))
    }

    /// Build a runner with explicit LLM and synthesizer collaborators.
    /// Used by tests to substitute deterministic doubles.
    pub fn with_collaborators(
        config: Config,
        llm: Box<dyn LLM>,
        synthesizer: Box<dyn SpeechSynthesizer>,
    ) -> Self {
        let style_sample_chars = config.llm.style_sample_chars;
        Self::assemble(
            config,
            ScriptGenerator::with_llm(llm, style_sample_chars),
            Narrator::with_synthesizer(synthesizer),
        )
    }

    fn assemble(config: Config, script_generator: ScriptGenerator, narrator: Narrator) -> Self {
        Self {
            transcriber: Transcriber::new(config.transcription.clone()),
            slide_extractor: SlideExtractor::new(config.slides.clone()),
            timeline_builder: TimelineBuilder::new(),
            assembler: VideoAssembler::new(config.assembly.clone()),
            script_generator,
            narrator,
            config,
        }
    }

    /// Run the whole pipeline for one (video, slide deck) job.
    pub async fn run(&self, video_path: &Path, pdf_path: &Path) -> Result<PipelineReport> {
        let start_time = Instant::now();
        let output_dir = self.config.output.base_dir.clone();
        let mut stages = Vec::new();

        if !video_path.exists() {
            return Err(PipelineError::Input(format!(
                "Source video not found: {}",
                video_path.display()
            ))
            .into());
        }

        tokio::fs::create_dir_all(&output_dir).await?;

        // Stage 1: style transcript. Fatal: narration tone depends on it.
        let stage_start = Instant::now();
        let transcript = self
            .transcriber
            .transcribe_video(video_path, &output_dir)
            .await?;
        stages.push(StageTiming {
            stage: PipelineStage::Transcription,
            duration: stage_start.elapsed(),
        });

        // Stage 2: slide rasterization + OCR.
        let stage_start = Instant::now();
        let slides = self
            .slide_extractor
            .extract_slides(pdf_path, &output_dir)
            .await?;
        stages.push(StageTiming {
            stage: PipelineStage::SlideExtraction,
            duration: stage_start.elapsed(),
        });
        info!("📑 Extracted {} slides", slides.len());

        // Stage 3: narration scripts, one per slide, in slide order.
        let stage_start = Instant::now();
        let scripts = self
            .script_generator
            .generate_scripts(&slides, &transcript)
            .await?;
        stages.push(StageTiming {
            stage: PipelineStage::ScriptGeneration,
            duration: stage_start.elapsed(),
        });
        self.save_scripts(&scripts, &output_dir).await?;

        // Stage 4: speech synthesis with tagged per-slide outcomes.
        let stage_start = Instant::now();
        let outcomes = self.narrator.narrate(&scripts, &output_dir).await?;
        stages.push(StageTiming {
            stage: PipelineStage::SpeechSynthesis,
            duration: stage_start.elapsed(),
        });

        // Stage 5: timeline over the synthesized clips. Informational for
        // the batch run; the assistant's slide index is built from it. The
        // builder rejects synthesis gaps, so a run with a failed slide aborts
        // here and never persists a misaligned timeline.json.
        let stage_start = Instant::now();
        let timeline = self.timeline_builder.build(&outcomes).await?;
        self.timeline_builder.save(&timeline, &output_dir).await?;
        stages.push(StageTiming {
            stage: PipelineStage::TimelineComputation,
            duration: stage_start.elapsed(),
        });

        // Stage 6: final video. Rejects runs with synthesis gaps.
        let stage_start = Instant::now();
        let final_video_path = self.assembler.build_video(&outcomes, &output_dir).await?;
        stages.push(StageTiming {
            stage: PipelineStage::VideoAssembly,
            duration: stage_start.elapsed(),
        });

        let report = PipelineReport {
            generated_at: chrono::Utc::now(),
            slide_count: slides.len(),
            synthesized_count: synthesized_paths(&outcomes).len(),
            transcript_path: transcript.text_path.clone(),
            final_video_path,
            timeline,
            outcomes,
            total_time: start_time.elapsed(),
            stages,
        };

        if self.config.output.save_report {
            self.save_report(&report, &output_dir).await?;
        }

        Ok(report)
    }

    /// Persist narration scripts as a JSON artifact. Byte-identical across
    /// runs when the collaborators are deterministic.
    async fn save_scripts(&self, scripts: &[String], output_dir: &Path) -> Result<()> {
        let path = output_dir.join("narration_scripts.json");
        let json = serde_json::to_string_pretty(scripts)?;
        tokio::fs::write(&path, json).await?;
        info!("💾 Narration scripts saved to: {}", path.display());
        Ok(())
    }

    async fn save_report(&self, report: &PipelineReport, output_dir: &Path) -> Result<()> {
        let path = output_dir.join("pipeline_report.json");
        match serde_json::to_string_pretty(report) {
            Ok(json) => {
                tokio::fs::write(&path, json).await?;
                info!("💾 Report saved to: {}", path.display());
            }
            Err(e) => warn!("Failed to serialize pipeline report: {}", e),
        }
        Ok(())
    }
}
