//! Error types for slidecast.

use thiserror::Error;

/// The three failure classes the pipeline distinguishes.
///
/// Configuration problems are fatal at startup, before any collaborator is
/// contacted. Collaborator failures abort the run except for per-slide speech
/// synthesis, which is recorded as a tagged outcome instead. Input problems
/// (missing video or slide deck) are surfaced to the user as such, not as a
/// raw I/O error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{stage} call failed: {message}")]
    Collaborator { stage: String, message: String },

    #[error("Input error: {0}")]
    Input(String),
}

impl PipelineError {
    pub fn collaborator(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            stage: stage.into(),
            message: message.into(),
        }
    }
}
