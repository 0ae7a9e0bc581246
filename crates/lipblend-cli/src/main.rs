//! Mouth-region compositing binary.
//!
//! Blends the mouth region of a lip-synced video back onto the original
//! video frame by frame, optionally refines each composited frame through
//! an external inpainting service, and reassembles the final video with the
//! source audio.

mod config;
mod relay_refiner;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lipblend_media::{
    assemble_video, CheckpointedFrameLoop, DirCheckpointStore, FfmpegAssembler,
    OnnxLandmarkDetector, VideoFrameStream,
};
use lipblend_models::{RelayEndpoint, DEFAULT_PAYLOAD_PATH};
use lipblend_relay::InpaintClient;

use crate::config::LipblendConfig;
use crate::relay_refiner::RelayRefiner;

#[derive(Debug, Parser)]
#[command(name = "lipblend", about = "Composite lip-synced mouth regions back onto original video")]
struct Cli {
    /// Video generated by the lip-sync model
    #[arg(short = 'f', long)]
    file: PathBuf,

    /// Original video path
    #[arg(short = 'i', long)]
    input_file: PathBuf,

    /// Post-process each frame through the inpainting relay ("true"/"false")
    #[arg(short = 'p', long, default_value = "true")]
    post_process: String,
}

impl Cli {
    fn post_process_enabled(&self) -> bool {
        self.post_process.eq_ignore_ascii_case("true")
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("lipblend=info".parse().unwrap())
        .add_directive("ort=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("lipblend failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    lipblend_media::check_ffmpeg()?;
    lipblend_media::check_ffprobe()?;

    let config = LipblendConfig::from_env();
    let layout = config.layout();
    std::fs::create_dir_all(layout.root())?;

    // Relay configuration is loaded up front so a broken payload file fails
    // before any frame work starts.
    let refiner = if cli.post_process_enabled() {
        let endpoint = RelayEndpoint::load(DEFAULT_PAYLOAD_PATH)?;
        info!(url = %endpoint.url, "Inpainting relay enabled");
        Some(RelayRefiner::new(InpaintClient::new(endpoint)))
    } else {
        info!("Inpainting relay disabled");
        None
    };

    // Model assets are validated here; a missing landmark model aborts the
    // run before the loop starts.
    let detector = OnnxLandmarkDetector::new_default()?;

    let original_info = lipblend_media::probe_video(&cli.input_file).await?;
    let synthesized = VideoFrameStream::open(&cli.file)?;
    let original = VideoFrameStream::open(&cli.input_file)?;
    let expected_frames = synthesized.frame_count();

    info!(
        synthesized = %synthesized.path().display(),
        original = %original.path().display(),
        frames = expected_frames,
        fps = original_info.fps,
        "Starting compositing loop"
    );

    let store = DirCheckpointStore::new(layout.clone());
    let mut pipeline =
        CheckpointedFrameLoop::new(synthesized, original, detector, store, layout.clone())?
            .with_expected_frames(expected_frames)
            .with_heartbeat(config.heartbeat_frames);
    if let Some(refiner) = refiner {
        pipeline = pipeline.with_refiner(Box::new(refiner));
    }

    let summary = pipeline.run().await?;

    let assembler = FfmpegAssembler::new(layout);
    let final_path = assemble_video(
        &assembler,
        &cli.file,
        original_info.fps,
        summary.frames_total,
    )
    .await?;

    info!("Done! File saved to {}", final_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_process_flag_parsing() {
        let cli = Cli::parse_from(["lipblend", "-f", "synced.mp4", "-i", "orig.mp4"]);
        assert!(cli.post_process_enabled());

        let cli = Cli::parse_from([
            "lipblend",
            "--file",
            "synced.mp4",
            "--input-file",
            "orig.mp4",
            "--post-process",
            "False",
        ]);
        assert!(!cli.post_process_enabled());
    }
}
