use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};

mod assembly;
mod assistant;
mod config;
mod error;
mod llm;
mod pipeline;
mod script;
mod slides;
mod timeline;
mod transcription;
mod tts;

use crate::config::Config;
use crate::pipeline::PipelineRunner;
use crate::slides::SlideExtractor;
use crate::transcription::Transcriber;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Slidecast")
        .version("0.1.0")
        .about("Generate a narrated teacher video from a lecture video and a slide deck")
        .arg(
            Arg::new("video")
                .short('i')
                .long("video")
                .value_name("FILE")
                .help("Source lecture video supplying the teaching-style transcript")
                .required(true),
        )
        .arg(
            Arg::new("slides")
                .short('s')
                .long("slides")
                .value_name("FILE")
                .help("Slide deck PDF")
                .required(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for artifacts")
                .default_value("./output"),
        )
        .arg(
            Arg::new("voice")
                .long("voice")
                .value_name("NAME")
                .help("Synthesis voice identity (overrides config)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let video_path = PathBuf::from(matches.get_one::<String>("video").unwrap());
    let pdf_path = PathBuf::from(matches.get_one::<String>("slides").unwrap());
    let output_dir = PathBuf::from(matches.get_one::<String>("output-dir").unwrap());
    let verbose = matches.get_flag("verbose");

    let filter = if verbose {
        "slidecast=debug,info"
    } else {
        "slidecast=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.output.base_dir = output_dir;
    if let Some(voice) = matches.get_one::<String>("voice") {
        config.speech.voice = voice.clone();
    }

    // The required credential is checked here, before any collaborator call.
    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e);
    }

    // External CLI tools are probed up front too, so a missing install fails
    // the run before any hosted API is contacted.
    let backend = Transcriber::check_availability().await?;
    info!("🎤 {}", backend);
    SlideExtractor::check_availability().await?;

    info!("🚀 Slidecast starting...");
    info!("🎞️  Source video: {}", video_path.display());
    info!("📑 Slide deck: {}", pdf_path.display());
    info!("📂 Output directory: {}", config.output.base_dir.display());
    info!("🗣️  Voice: {}", config.speech.voice);

    let runner = PipelineRunner::new(config)?;

    let start_time = std::time::Instant::now();
    let report = runner.run(&video_path, &pdf_path).await?;
    let duration = start_time.elapsed();

    info!("🎉 Pipeline completed in {:.2}s", duration.as_secs_f64());
    info!("📑 Slides: {}", report.slide_count);
    info!(
        "🔊 Narration clips: {}/{}",
        report.synthesized_count, report.slide_count
    );
    info!("🕒 Total runtime: {:.1}s", report.timeline.total_duration());
    info!("📹 Output: {}", report.final_video_path.display());

    Ok(())
}
