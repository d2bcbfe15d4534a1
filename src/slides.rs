use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SlideConfig;
use crate::error::PipelineError;

/// One slide page: 1-based index, rasterized image, extracted text.
///
/// Order is presentation order and fixed after extraction. The OCR text may
/// be empty; downstream stages must tolerate that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slide {
    pub index: usize,
    pub image_path: PathBuf,
    pub text: String,
}

/// Rasterizes slide deck pages and extracts their visible text via OCR.
#[derive(Debug, Clone)]
pub struct SlideExtractor {
    config: SlideConfig,
}

impl SlideExtractor {
    pub fn new(config: SlideConfig) -> Self {
        Self { config }
    }

    /// Extract all pages of a slide deck as ordered (image, text) pairs.
    ///
    /// Images are written as `slide_<n>.png` with 1-based numbering.
    pub async fn extract_slides(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<Slide>> {
        if !pdf_path.exists() {
            return Err(PipelineError::Input(format!(
                "Slide deck not found: {}",
                pdf_path.display()
            ))
            .into());
        }

        info!("📑 Rasterizing slide deck: {}", pdf_path.display());
        tokio::fs::create_dir_all(output_dir).await?;

        let page_images = self.rasterize_pages(pdf_path, output_dir).await?;
        info!("🖼️  Rasterized {} pages", page_images.len());

        let mut slides = Vec::with_capacity(page_images.len());
        for (i, page_image) in page_images.into_iter().enumerate() {
            let index = i + 1;
            let image_path = output_dir.join(format!("slide_{}.png", index));
            if page_image != image_path {
                tokio::fs::rename(&page_image, &image_path).await?;
            }

            let text = self.ocr_image(&image_path).await?;
            if text.is_empty() {
                // Not an error: picture-only slides produce no OCR text.
                debug!("Slide {} has no OCR text", index);
            }

            info!("✅ Slide {} extracted ({} characters)", index, text.len());
            slides.push(Slide {
                index,
                image_path,
                text,
            });
        }

        Ok(slides)
    }

    /// Rasterize every PDF page to PNG via pdftoppm, returning page image
    /// paths in page order.
    async fn rasterize_pages(&self, pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let prefix = output_dir.join("page");

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.config.dpi.to_string())
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "pdftoppm failed for {}: {}",
                pdf_path.display(),
                stderr.trim()
            ));
        }

        // pdftoppm names pages page-1.png, page-2.png (zero-padded for large
        // decks); sort by the numeric suffix to recover page order.
        let mut pages: Vec<(u32, PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(number) = name
                .strip_prefix("page-")
                .and_then(|rest| rest.strip_suffix(".png"))
                .and_then(|num| num.parse::<u32>().ok())
            {
                pages.push((number, path));
            }
        }

        if pages.is_empty() {
            return Err(anyhow!(
                "pdftoppm produced no pages for {}",
                pdf_path.display()
            ));
        }

        pages.sort_by_key(|(number, _)| *number);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    /// Run tesseract on a page image and return the trimmed OCR text.
    async fn ocr_image(&self, image_path: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.ocr_language)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "tesseract failed for {}: {}",
                image_path.display(),
                stderr.trim()
            ));
        }

        if !output.stderr.is_empty() {
            debug!(
                "tesseract stderr for {}: {}",
                image_path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Check that the external tools this stage shells out to are installed.
    pub async fn check_availability() -> Result<()> {
        for (tool, version_flag) in REQUIRED_TOOLS {
            let available = Command::new(tool)
                .arg(version_flag)
                .output()
                .await
                .map(|output| output.status.success())
                .unwrap_or(false);

            if !available {
                warn!("{} not found on PATH", tool);
                return Err(anyhow!(
                    "{} not found. Install poppler-utils and tesseract-ocr",
                    tool
                ));
            }
        }
        Ok(())
    }
}

// Version flags differ per tool: poppler accepts -v, tesseract only --version.
const REQUIRED_TOOLS: [(&str, &str); 2] = [("pdftoppm", "-v"), ("tesseract", "--version")];

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SlideConfig {
        SlideConfig {
            dpi: 150,
            ocr_language: "eng".to_string(),
        }
    }

    #[test]
    fn test_extractor_creation() {
        let extractor = SlideExtractor::new(test_config());
        assert_eq!(extractor.config.dpi, 150);
    }

    #[tokio::test]
    async fn test_missing_deck_is_input_error() {
        let extractor = SlideExtractor::new(test_config());
        let temp_dir = tempfile::tempdir().unwrap();

        let err = extractor
            .extract_slides(Path::new("no_such_deck.pdf"), temp_dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Input error"));
    }

    #[test]
    fn test_tool_probe_flags() {
        // tesseract rejects -v; probing with it would report the tool missing
        // even when installed.
        let tesseract = REQUIRED_TOOLS
            .iter()
            .find(|(tool, _)| *tool == "tesseract")
            .unwrap();
        assert_eq!(tesseract.1, "--version");
    }

    #[test]
    fn test_slide_tolerates_empty_text() {
        let slide = Slide {
            index: 1,
            image_path: PathBuf::from("slide_1.png"),
            text: String::new(),
        };
        assert!(slide.text.is_empty());
        assert_eq!(slide.index, 1);
    }
}
