//! Slidecast - Narrated Lecture Video Generator
//!
//! Batch pipeline turning a source lecture video and a slide deck PDF into a
//! narrated teacher video, plus an interactive assistant that answers
//! questions about the lecture at the current playback position.

pub mod assembly;
pub mod assistant;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod script;
pub mod slides;
pub mod timeline;
pub mod transcription;
pub mod tts;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::assembly::VideoAssembler;
pub use crate::assistant::{Assistant, PlaybackClock, TopicResolver};
pub use crate::config::{Config, ConfigBuilder, TopicMode};
pub use crate::error::PipelineError;
pub use crate::llm::{ChatMessage, LLM, LLMProvider};
pub use crate::pipeline::{PipelineReport, PipelineRunner, PipelineStage};
pub use crate::script::ScriptGenerator;
pub use crate::slides::{Slide, SlideExtractor};
pub use crate::timeline::{Timeline, TimelineBuilder};
pub use crate::transcription::{Transcriber, Transcript};
pub use crate::tts::{Narrator, SpeechSynthesizer, SynthesisOutcome};
