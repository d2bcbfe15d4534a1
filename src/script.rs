use anyhow::Result;
use tracing::{debug, info};

use crate::config::LLMConfig;
use crate::llm::{create_llm, ChatMessage, LLM};
use crate::slides::Slide;
use crate::transcription::Transcript;

const SYSTEM_PROMPT: &str = "You are a teacher recording a video lesson.";

/// Generates one spoken-style narration script per slide.
///
/// Calls are made one slide at a time, synchronously, in slide order. No
/// retry is attempted; a failed call aborts the run.
pub struct ScriptGenerator {
    llm: Box<dyn LLM>,
    style_sample_chars: usize,
}

impl ScriptGenerator {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let llm = create_llm(config)?;
        Ok(Self {
            llm,
            style_sample_chars: config.style_sample_chars,
        })
    }

    /// Construct with an explicit LLM implementation. Used by tests to
    /// substitute a deterministic collaborator.
    pub fn with_llm(llm: Box<dyn LLM>, style_sample_chars: usize) -> Self {
        Self {
            llm,
            style_sample_chars,
        }
    }

    /// Produce exactly one narration string per slide, in slide order.
    pub async fn generate_scripts(
        &self,
        slides: &[Slide],
        transcript: &Transcript,
    ) -> Result<Vec<String>> {
        let style_sample = transcript.style_sample(self.style_sample_chars);
        let mut scripts = Vec::with_capacity(slides.len());

        for slide in slides {
            debug!(
                "Generating narration for slide {} ({} slide chars)",
                slide.index,
                slide.text.len()
            );

            let prompt = build_narration_prompt(&slide.text, style_sample);
            let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

            let response = self.llm.chat(messages).await?;
            let narration = response.content.trim().to_string();

            info!("✅ Slide {} script done.", slide.index);
            scripts.push(narration);
        }

        Ok(scripts)
    }
}

/// Build the narration prompt for one slide. The slide text is embedded raw
/// (it may be empty for picture-only slides) together with the bounded style
/// exemplar. Invented student names are explicitly forbidden.
fn build_narration_prompt(slide_text: &str, style_sample: &str) -> String {
    format!(
        "You are a real teacher presenting a lesson. Here's the content of a slide:\n\
        ---\n\
        {}\n\
        ---\n\
        And here's the teaching tone from a real classroom transcript:\n\
        ---\n\
        {}\n\
        ---\n\
        \n\
        Write a natural, spoken narration for this slide. Speak clearly, avoid fake names or students.",
        slide_text, style_sample
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, LLMResponse};
    use async_trait::async_trait;
    use std::path::PathBuf;

    /// Deterministic LLM double: echoes a narration derived from the prompt.
    struct EchoLLM;

    impl EchoLLM {
        fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl LLM for EchoLLM {
        async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            let user = &messages.last().unwrap().content;
            Ok(LLMResponse {
                content: format!("  Narration for prompt of {} chars.  ", user.chars().count()),
                tokens_used: Some(42),
            })
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::LMStudio
        }
    }

    fn slide(index: usize, text: &str) -> Slide {
        Slide {
            index,
            image_path: PathBuf::from(format!("slide_{}.png", index)),
            text: text.to_string(),
        }
    }

    fn transcript(text: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            text_path: PathBuf::from("transcript.txt"),
        }
    }

    #[tokio::test]
    async fn test_one_narration_per_slide_in_order() {
        let generator = ScriptGenerator::with_llm(Box::new(EchoLLM::new()), 1500);
        let slides = vec![slide(1, "Intro"), slide(2, "Body"), slide(3, "End")];
        let scripts = generator
            .generate_scripts(&slides, &transcript("hello class"))
            .await
            .unwrap();

        assert_eq!(scripts.len(), 3);
        // Different slide texts produce different prompt lengths, so the echo
        // output differs per slide and preserves order.
        assert_ne!(scripts[0], scripts[1]);
    }

    #[tokio::test]
    async fn test_zero_slides_zero_narrations() {
        let generator = ScriptGenerator::with_llm(Box::new(EchoLLM::new()), 1500);
        let scripts = generator
            .generate_scripts(&[], &transcript("style"))
            .await
            .unwrap();
        assert!(scripts.is_empty());
    }

    #[tokio::test]
    async fn test_empty_ocr_text_still_produces_narration() {
        let generator = ScriptGenerator::with_llm(Box::new(EchoLLM::new()), 1500);
        let slides = vec![slide(1, "")];
        let scripts = generator
            .generate_scripts(&slides, &transcript("style sample"))
            .await
            .unwrap();

        assert_eq!(scripts.len(), 1);
        assert!(!scripts[0].is_empty());
    }

    #[tokio::test]
    async fn test_responses_are_trimmed() {
        let generator = ScriptGenerator::with_llm(Box::new(EchoLLM::new()), 1500);
        let scripts = generator
            .generate_scripts(&[slide(1, "x")], &transcript("t"))
            .await
            .unwrap();
        assert_eq!(scripts[0], scripts[0].trim());
    }

    #[tokio::test]
    async fn test_style_sample_is_bounded() {
        let long_transcript = "a".repeat(5000);

        // The echo double reports the prompt length, so an unbounded style
        // sample would show up as a prompt of 5000+ characters.
        let generator = ScriptGenerator::with_llm(Box::new(EchoLLM::new()), 1500);
        let scripts = generator
            .generate_scripts(&[slide(1, "text")], &transcript(&long_transcript))
            .await
            .unwrap();

        let prompt_chars: usize = scripts[0]
            .trim_start_matches("Narration for prompt of ")
            .trim_end_matches(" chars.")
            .parse()
            .unwrap();
        assert!(prompt_chars < 2000, "prompt was {} chars", prompt_chars);
    }

    #[test]
    fn test_prompt_embeds_slide_and_style() {
        let prompt = build_narration_prompt("Photosynthesis basics", "So, welcome back everyone");
        assert!(prompt.contains("Photosynthesis basics"));
        assert!(prompt.contains("So, welcome back everyone"));
        assert!(prompt.contains("avoid fake names or students"));
    }

    #[test]
    fn test_prompt_with_empty_slide_text_keeps_section() {
        let prompt = build_narration_prompt("", "style");
        assert!(prompt.contains("---\n\n---"));
    }
}
