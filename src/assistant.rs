use anyhow::Result;
use tracing::{debug, info};

use crate::config::{AssistantConfig, LLMConfig, TopicBand, TopicMode};
use crate::llm::{create_llm, ChatMessage, LLM};
use crate::timeline::Timeline;

const SYSTEM_PROMPT: &str =
    "You are a helpful teaching assistant answering questions about a recorded lecture.";

/// Last observed playback position, fed by an external clock source
/// (a user-set slider or a polled in-page time probe).
///
/// Updates are expected to be non-decreasing but may arrive late or out of
/// order; the clock keeps the maximum seen and never regresses on a stale
/// read. A deliberate seek backwards is a `reset`, not an `update`.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    seconds: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a clock reading. Stale (smaller) values are ignored.
    pub fn update(&mut self, seconds: f64) {
        if seconds > self.seconds {
            self.seconds = seconds;
        }
    }

    /// Explicitly reposition the clock, e.g. after a user seek.
    pub fn reset(&mut self, seconds: f64) {
        self.seconds = seconds.max(0.0);
    }

    pub fn current(&self) -> f64 {
        self.seconds
    }
}

/// Resolves a playback time to a topic label.
///
/// The two historical lookup variants are modes of one component: static
/// hardcoded bands, or binary search over the actual slide timeline.
#[derive(Debug, Clone)]
pub enum TopicResolver {
    Bands(Vec<TopicBand>),
    Timeline { timeline: Timeline, topics: Vec<String> },
}

impl TopicResolver {
    /// Build the resolver named by the assistant configuration. Timeline mode
    /// needs the computed timeline and per-slide topic labels; when they are
    /// absent it falls back to bands.
    pub fn from_config(
        config: &AssistantConfig,
        timeline: Option<(&Timeline, &[String])>,
    ) -> Self {
        match (&config.topic_mode, timeline) {
            (TopicMode::Timeline, Some((timeline, topics))) => Self::Timeline {
                timeline: timeline.clone(),
                topics: topics.to_vec(),
            },
            _ => Self::Bands(config.bands.clone()),
        }
    }

    /// Map a playback time to its topic label.
    pub fn resolve(&self, seconds: f64) -> String {
        match self {
            Self::Bands(bands) => {
                if bands.is_empty() {
                    return "the lecture".to_string();
                }
                let idx = bands.partition_point(|band| band.start <= seconds);
                // Times before the first band clamp to it; times past the
                // last band's start stay in the last band.
                let band = if idx == 0 { &bands[0] } else { &bands[idx - 1] };
                band.topic.clone()
            }
            Self::Timeline { timeline, topics } => match timeline.slide_at(seconds) {
                Some(slide) => topics
                    .get(slide - 1)
                    .cloned()
                    .unwrap_or_else(|| format!("Slide {}", slide)),
                None => "the lecture".to_string(),
            },
        }
    }
}

/// Derive per-slide topic labels from extracted slide text: the first
/// non-empty OCR line, or a positional label for picture-only slides.
pub fn slide_topics(slide_texts: &[String]) -> Vec<String> {
    slide_texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            text.lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Slide {}", i + 1))
        })
        .collect()
}

/// Sidebar chatbot answering questions about the lecture at the current
/// playback position. One active session per process; LLM failures are
/// returned for inline display and never abort the session.
pub struct Assistant {
    llm: Box<dyn LLM>,
    resolver: TopicResolver,
    clock: PlaybackClock,
}

impl Assistant {
    pub fn new(llm_config: &LLMConfig, resolver: TopicResolver) -> Result<Self> {
        let llm = create_llm(llm_config)?;
        Ok(Self {
            llm,
            resolver,
            clock: PlaybackClock::new(),
        })
    }

    /// Construct with an explicit LLM implementation. Used by tests.
    pub fn with_llm(llm: Box<dyn LLM>, resolver: TopicResolver) -> Self {
        Self {
            llm,
            resolver,
            clock: PlaybackClock::new(),
        }
    }

    /// Feed a playback clock reading from the polling source.
    pub fn observe_clock(&mut self, seconds: f64) {
        self.clock.update(seconds);
    }

    /// Current playback position as last observed.
    pub fn playback_position(&self) -> f64 {
        self.clock.current()
    }

    /// Answer a free-text question, resolving the topic from an explicit
    /// playback time or, when absent, the last observed clock reading.
    pub async fn ask(&self, question: &str, at_time: Option<f64>) -> Result<String> {
        let seconds = at_time.unwrap_or_else(|| self.clock.current());
        let topic = self.resolver.resolve(seconds);
        debug!("Resolved t={:.1}s to topic '{}'", seconds, topic);

        let prompt = build_answer_prompt(&topic, question);
        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

        let response = self.llm.chat(messages).await?;
        let answer = response.content.trim().to_string();

        info!("💬 Answered question at t={:.1}s ({})", seconds, topic);
        Ok(answer)
    }
}

/// Build the single-turn answer prompt: resolved topic plus the verbatim
/// question.
fn build_answer_prompt(topic: &str, question: &str) -> String {
    format!(
        "The student is currently watching the part of the lecture about: {}\n\
        \n\
        Their question:\n\
        {}\n\
        \n\
        Answer clearly and concisely, as the teacher of this lecture would.",
        topic, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::{LLMProvider, LLMResponse};
    use async_trait::async_trait;

    struct CannedLLM(String);

    #[async_trait]
    impl LLM for CannedLLM {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse> {
            Ok(LLMResponse {
                content: self.0.clone(),
                tokens_used: None,
            })
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::LMStudio
        }
    }

    fn default_bands_resolver() -> TopicResolver {
        TopicResolver::Bands(Config::default().assistant.bands)
    }

    #[test]
    fn test_band_resolution_at_700_seconds() {
        let resolver = default_bands_resolver();
        assert_eq!(resolver.resolve(700.0), "Main Concepts");
    }

    #[test]
    fn test_band_edges() {
        let resolver = default_bands_resolver();
        assert_eq!(resolver.resolve(0.0), "Introduction");
        assert_eq!(resolver.resolve(599.9), "Introduction");
        assert_eq!(resolver.resolve(600.0), "Main Concepts");
        assert_eq!(resolver.resolve(1200.0), "Summary");
        assert_eq!(resolver.resolve(99999.0), "Summary");
    }

    #[test]
    fn test_timeline_resolution_uses_slide_topics() {
        let timeline = Timeline::from_durations(&[10.0, 20.0]);
        let topics = vec!["Cell Structure".to_string(), "Mitosis".to_string()];
        let resolver = TopicResolver::Timeline { timeline, topics };

        assert_eq!(resolver.resolve(5.0), "Cell Structure");
        assert_eq!(resolver.resolve(15.0), "Mitosis");
    }

    #[test]
    fn test_resolver_falls_back_to_bands_without_timeline() {
        let mut config = Config::default().assistant;
        config.topic_mode = TopicMode::Timeline;
        let resolver = TopicResolver::from_config(&config, None);
        assert!(matches!(resolver, TopicResolver::Bands(_)));
    }

    #[test]
    fn test_clock_never_regresses_on_stale_update() {
        let mut clock = PlaybackClock::new();
        clock.update(30.0);
        clock.update(12.0); // stale poll result
        assert_eq!(clock.current(), 30.0);
        clock.update(45.0);
        assert_eq!(clock.current(), 45.0);
    }

    #[test]
    fn test_clock_reset_allows_seeking_back() {
        let mut clock = PlaybackClock::new();
        clock.update(100.0);
        clock.reset(10.0);
        assert_eq!(clock.current(), 10.0);
    }

    #[test]
    fn test_slide_topics_from_ocr_text() {
        let texts = vec![
            "Photosynthesis\nLight reactions".to_string(),
            String::new(),
            "\n  Krebs Cycle  \n".to_string(),
        ];
        let topics = slide_topics(&texts);
        assert_eq!(topics, vec!["Photosynthesis", "Slide 2", "Krebs Cycle"]);
    }

    #[tokio::test]
    async fn test_ask_uses_observed_clock() {
        let mut assistant = Assistant::with_llm(
            Box::new(CannedLLM("The middle part covers the main ideas.".to_string())),
            default_bands_resolver(),
        );
        assistant.observe_clock(700.0);

        let answer = assistant.ask("What is this section about?", None).await.unwrap();
        assert_eq!(answer, "The middle part covers the main ideas.");
        assert_eq!(assistant.playback_position(), 700.0);
    }

    #[tokio::test]
    async fn test_explicit_time_overrides_clock() {
        let assistant = Assistant::with_llm(
            Box::new(CannedLLM("answer".to_string())),
            default_bands_resolver(),
        );
        let answer = assistant.ask("q", Some(50.0)).await.unwrap();
        assert_eq!(answer, "answer");
    }

    #[test]
    fn test_prompt_embeds_topic_and_verbatim_question() {
        let prompt = build_answer_prompt("Mitosis", "Why do cells divide?");
        assert!(prompt.contains("Mitosis"));
        assert!(prompt.contains("Why do cells divide?"));
    }
}
