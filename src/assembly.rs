use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::AssemblyConfig;
use crate::error::PipelineError;
use crate::tts::{failed_slides, SynthesisOutcome};

pub const FINAL_VIDEO_NAME: &str = "final_teacher_video.mp4";

/// Stitches per-slide images and narration audio into the final video.
///
/// Each slide's on-screen time equals its audio duration exactly, so the
/// output's total duration is the sum of all clip durations. Output is
/// written at a fixed low frame rate suited to static slide content.
#[derive(Debug, Clone)]
pub struct VideoAssembler {
    config: AssemblyConfig,
}

impl VideoAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    /// Build `final_teacher_video.mp4` from the index-aligned slide images
    /// and synthesis outcomes under `output_dir`.
    ///
    /// Fails fast when any slide's synthesis failed: assembling around a gap
    /// would silently shift every later slide against its image.
    pub async fn build_video(
        &self,
        outcomes: &[SynthesisOutcome],
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let failed = failed_slides(outcomes);
        if !failed.is_empty() {
            return Err(PipelineError::collaborator(
                "video assembly",
                format!("missing narration audio for slides {:?}", failed),
            )
            .into());
        }

        if outcomes.is_empty() {
            return Err(anyhow!("No slides to assemble"));
        }

        info!("🎬 Assembling {} slide segments...", outcomes.len());

        let segments_dir = output_dir.join("segments");
        tokio::fs::create_dir_all(&segments_dir).await?;

        let mut segment_paths = Vec::with_capacity(outcomes.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            let index = i + 1;
            let image_path = output_dir.join(format!("slide_{}.png", index));
            // Failures were rejected above, so every outcome carries a path.
            let audio_path = match outcome.path() {
                Some(path) => path.to_path_buf(),
                None => continue,
            };
            let segment_path = segments_dir.join(format!("segment_{}.mp4", index));

            self.build_segment(&image_path, &audio_path, &segment_path)
                .await?;
            info!("✅ Segment {} assembled", index);
            segment_paths.push(segment_path);
        }

        let final_path = output_dir.join(FINAL_VIDEO_NAME);
        self.concatenate_segments(&segment_paths, &segments_dir, &final_path)
            .await?;

        let _ = tokio::fs::remove_dir_all(&segments_dir).await;

        info!("🎉 Final video written: {}", final_path.display());
        Ok(final_path)
    }

    /// Render one still-image segment whose duration equals its audio clip.
    async fn build_segment(
        &self,
        image_path: &Path,
        audio_path: &Path,
        segment_path: &Path,
    ) -> Result<()> {
        let filter = if self.config.normalize_resolution {
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
                w = self.config.canonical_width,
                h = self.config.canonical_height
            )
        } else {
            // libx264 requires even dimensions; slide rasters are otherwise
            // left at their native size.
            "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string()
        };

        let status = Command::new("ffmpeg")
            .arg("-loop")
            .arg("1")
            .arg("-i")
            .arg(image_path)
            .arg("-i")
            .arg(audio_path)
            .args(["-c:v", "libx264", "-tune", "stillimage"])
            .args(["-vf", &filter])
            .args(["-r", &self.config.fps.to_string()])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-c:a", "aac"])
            .arg("-shortest") // stop when the audio track ends
            .arg("-y")
            .arg(segment_path)
            .status()
            .await?;

        if !status.success() {
            return Err(anyhow!(
                "ffmpeg segment build failed for {}",
                image_path.display()
            ));
        }

        Ok(())
    }

    /// Concatenate segments in index order via an ffmpeg concat list.
    async fn concatenate_segments(
        &self,
        segment_paths: &[PathBuf],
        work_dir: &Path,
        final_path: &Path,
    ) -> Result<()> {
        let concat_list = work_dir.join("segments.txt");
        let mut list_content = String::new();
        for path in segment_paths {
            let canonical = tokio::fs::canonicalize(path).await?;
            list_content.push_str(&format!("file '{}'\n", canonical.display()));
        }
        tokio::fs::write(&concat_list, &list_content).await?;

        // Frame-copy concatenation: every segment shares codec settings, so
        // streams are copied without re-encoding.
        let status = Command::new("ffmpeg")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&concat_list)
            .args(["-c", "copy"])
            .arg("-y")
            .arg(final_path)
            .status()
            .await?;

        if !status.success() {
            warn!("ffmpeg concat with stream copy failed; retrying with re-encode");
            let status = Command::new("ffmpeg")
                .args(["-f", "concat", "-safe", "0", "-i"])
                .arg(&concat_list)
                .args(["-c:v", "libx264", "-c:a", "aac"])
                .arg("-y")
                .arg(final_path)
                .status()
                .await?;

            if !status.success() {
                return Err(anyhow!("ffmpeg failed to concatenate slide segments"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn outcome(path: &str) -> SynthesisOutcome {
        SynthesisOutcome::Synthesized {
            path: PathBuf::from(path),
        }
    }

    #[tokio::test]
    async fn test_rejects_failed_outcomes() {
        let assembler = VideoAssembler::new(Config::default().assembly);
        let temp_dir = tempfile::tempdir().unwrap();

        let outcomes = vec![
            outcome("slide_audio_1.mp3"),
            SynthesisOutcome::Failed {
                reason: "boom".to_string(),
            },
        ];

        let err = assembler
            .build_video(&outcomes, temp_dir.path())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("video assembly"));
        assert!(msg.contains("[2]"));
    }

    #[tokio::test]
    async fn test_rejects_empty_input() {
        let assembler = VideoAssembler::new(Config::default().assembly);
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(assembler.build_video(&[], temp_dir.path()).await.is_err());
    }

    #[test]
    fn test_default_frame_rate_is_one() {
        let assembler = VideoAssembler::new(Config::default().assembly);
        assert_eq!(assembler.config.fps, 1);
    }
}
