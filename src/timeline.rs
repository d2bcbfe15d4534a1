use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;
use crate::tts::{failed_slides, SynthesisOutcome};

/// Cumulative slide start offsets derived from audio clip durations.
///
/// For clip durations `[d1, d2, ..., dn]` the offsets are
/// `[0, d1, d1+d2, ..., Σdi]` — one entry more than the clip count,
/// non-decreasing. Recomputed whenever the audio changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub offsets: Vec<f64>,
}

impl Timeline {
    /// Build a timeline from known clip durations in seconds.
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut offsets = Vec::with_capacity(durations.len() + 1);
        offsets.push(0.0);
        for duration in durations {
            offsets.push(offsets.last().copied().unwrap_or(0.0) + duration);
        }
        Self { offsets }
    }

    /// Number of slides covered by this timeline.
    pub fn slide_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total duration in seconds.
    pub fn total_duration(&self) -> f64 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// Resolve a playback time to its 1-based slide number by binary search
    /// over the cumulative offsets. Times past the end map to the last slide;
    /// an empty timeline resolves to nothing.
    pub fn slide_at(&self, seconds: f64) -> Option<usize> {
        if self.slide_count() == 0 {
            return None;
        }

        // partition_point finds how many offsets are <= t; the slide is the
        // interval [offsets[i-1], offsets[i]).
        let idx = self.offsets.partition_point(|&offset| offset <= seconds);
        if idx == 0 {
            Some(1) // negative times clamp to the first slide
        } else {
            Some(idx.min(self.slide_count()))
        }
    }
}

/// Probes generated audio clips and computes the slide timeline.
#[derive(Debug, Clone, Default)]
pub struct TimelineBuilder;

impl TimelineBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Probe each clip's playable duration and accumulate offsets.
    ///
    /// Takes the full per-slide outcome list and rejects runs with synthesis
    /// gaps before probing anything: building over only the successful clips
    /// would record clip n+1's start at slide n's offset, and a later
    /// assistant session reading `timeline.json` would resolve playback times
    /// to the wrong slides.
    pub async fn build(&self, outcomes: &[SynthesisOutcome]) -> Result<Timeline> {
        let failed = failed_slides(outcomes);
        if !failed.is_empty() {
            return Err(PipelineError::collaborator(
                "timeline computation",
                format!("missing narration audio for slides {:?}", failed),
            )
            .into());
        }

        let mut durations = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(path) = outcome.path() {
                durations.push(probe_duration_seconds(path).await?);
            }
        }

        let timeline = Timeline::from_durations(&durations);
        info!(
            "🕒 Timeline built: {} slides, {:.1}s total",
            timeline.slide_count(),
            timeline.total_duration()
        );

        Ok(timeline)
    }

    /// Persist the timeline as a JSON artifact next to the other outputs.
    pub async fn save(&self, timeline: &Timeline, output_dir: &Path) -> Result<std::path::PathBuf> {
        let path = output_dir.join("timeline.json");
        let json = serde_json::to_string_pretty(timeline)?;
        tokio::fs::write(&path, json).await?;
        info!("💾 Timeline saved to: {}", path.display());
        Ok(path)
    }
}

/// Probe a media file's duration in seconds via ffprobe.
pub async fn probe_duration_seconds(path: &Path) -> Result<f64> {
    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
        ])
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(anyhow!("ffprobe failed for {}", path.display()));
    }

    let json_str = String::from_utf8(output.stdout)?;
    let ffprobe_data: serde_json::Value = serde_json::from_str(&json_str)?;

    let duration = ffprobe_data["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| anyhow!("No duration reported for {}", path.display()))?;

    if duration <= 0.0 {
        return Err(anyhow!(
            "Non-positive duration for {}: {}",
            path.display(),
            duration
        ));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_offsets() {
        let timeline = Timeline::from_durations(&[3.5, 2.0, 4.5]);
        assert_eq!(timeline.offsets, vec![0.0, 3.5, 5.5, 10.0]);
        assert_eq!(timeline.slide_count(), 3);
        assert_eq!(timeline.total_duration(), 10.0);
    }

    #[test]
    fn test_offsets_length_is_n_plus_one() {
        for n in 0..5 {
            let durations = vec![1.0; n];
            let timeline = Timeline::from_durations(&durations);
            assert_eq!(timeline.offsets.len(), n + 1);
        }
    }

    #[test]
    fn test_offsets_non_decreasing() {
        let timeline = Timeline::from_durations(&[1.0, 0.0, 2.5, 0.1]);
        for pair in timeline.offsets.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = Timeline::from_durations(&[]);
        assert_eq!(timeline.offsets, vec![0.0]);
        assert_eq!(timeline.slide_count(), 0);
        assert_eq!(timeline.slide_at(10.0), None);
    }

    #[test]
    fn test_slide_lookup_by_binary_search() {
        // Slides: [0, 10), [10, 25), [25, 30)
        let timeline = Timeline::from_durations(&[10.0, 15.0, 5.0]);
        assert_eq!(timeline.slide_at(0.0), Some(1));
        assert_eq!(timeline.slide_at(9.9), Some(1));
        assert_eq!(timeline.slide_at(10.0), Some(2));
        assert_eq!(timeline.slide_at(24.9), Some(2));
        assert_eq!(timeline.slide_at(25.0), Some(3));
    }

    #[test]
    fn test_lookup_clamps_out_of_range() {
        let timeline = Timeline::from_durations(&[10.0, 10.0]);
        assert_eq!(timeline.slide_at(-5.0), Some(1));
        assert_eq!(timeline.slide_at(500.0), Some(2));
    }

    #[tokio::test]
    async fn test_build_rejects_synthesis_gaps() {
        let builder = TimelineBuilder::new();
        let outcomes = vec![
            SynthesisOutcome::Synthesized {
                path: std::path::PathBuf::from("slide_audio_1.mp3"),
            },
            SynthesisOutcome::Failed {
                reason: "boom".to_string(),
            },
            SynthesisOutcome::Synthesized {
                path: std::path::PathBuf::from("slide_audio_3.mp3"),
            },
        ];

        // The gap is rejected before any clip is probed, so no misaligned
        // offsets can ever be computed, let alone persisted.
        let err = builder.build(&outcomes).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("timeline computation"));
        assert!(msg.contains("[2]"));
    }

    #[tokio::test]
    async fn test_build_empty_outcomes() {
        let builder = TimelineBuilder::new();
        let timeline = builder.build(&[]).await.unwrap();
        assert_eq!(timeline.offsets, vec![0.0]);
    }
}
