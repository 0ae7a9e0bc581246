//! Final video assembly from the persisted frame sequence.
//!
//! Encoding, audio probing, extraction, and muxing are behind the
//! `VideoAssembler` trait so the orchestration stays testable with a fake.
//! Assembly failures leave every per-frame output on disk; a retry re-runs
//! assembly alone without recomputing frames.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lipblend_models::OutputLayout;
use tracing::info;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::probe;

/// Bitrate for the intermediate silent container.
const SILENT_VIDEO_BITRATE: &str = "5000k";

/// Turns the frame sequence back into a video and reattaches audio.
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    /// Encode the frame sequence into the silent container.
    async fn encode_frames(&self, fps: f64, nb_frames: u64) -> MediaResult<()>;

    /// Whether `source` carries an audio track.
    async fn has_audio(&self, source: &Path) -> MediaResult<bool>;

    /// Extract the audio track from `source`.
    async fn extract_audio(&self, source: &Path) -> MediaResult<()>;

    /// Remux the extracted audio into the silent container.
    async fn mux_audio(&self) -> MediaResult<()>;

    /// Promote the silent container to the final output (no-audio path).
    async fn finalize_silent(&self) -> MediaResult<()>;

    /// Final output path for the audio / no-audio outcome.
    fn final_path(&self, with_audio: bool) -> PathBuf;
}

/// Run the full assembly sequence and return the final video path.
pub async fn assemble_video(
    assembler: &dyn VideoAssembler,
    audio_source: &Path,
    fps: f64,
    nb_frames: u64,
) -> MediaResult<PathBuf> {
    info!(fps, nb_frames, "Encoding frame sequence");
    assembler.encode_frames(fps, nb_frames).await?;

    let final_path = if assembler.has_audio(audio_source).await? {
        info!("Audio track found, extracting and remuxing");
        assembler.extract_audio(audio_source).await?;
        assembler.mux_audio().await?;
        assembler.final_path(true)
    } else {
        info!("No audio track in source, promoting silent container");
        assembler.finalize_silent().await?;
        assembler.final_path(false)
    };

    info!("Assembly complete: {}", final_path.display());
    Ok(final_path)
}

/// FFmpeg-backed assembler over the output layout.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    layout: OutputLayout,
}

impl FfmpegAssembler {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn encode_frames(&self, fps: f64, nb_frames: u64) -> MediaResult<()> {
        FfmpegCommand::new(self.layout.frame_pattern(), self.layout.silent_video())
            .framerate(fps)
            .start_number(0)
            .vframes(nb_frames)
            .video_bitrate(SILENT_VIDEO_BITRATE)
            .run()
            .await
    }

    async fn has_audio(&self, source: &Path) -> MediaResult<bool> {
        probe::has_audio_stream(source).await
    }

    async fn extract_audio(&self, source: &Path) -> MediaResult<()> {
        FfmpegCommand::new(source, self.layout.audio_track())
            .no_video()
            .audio_codec("copy")
            .run()
            .await
    }

    async fn mux_audio(&self) -> MediaResult<()> {
        FfmpegCommand::new(self.layout.silent_video(), self.layout.muxed_video())
            .add_input(self.layout.audio_track())
            .video_codec("copy")
            .audio_codec("aac")
            .run()
            .await
    }

    async fn finalize_silent(&self) -> MediaResult<()> {
        tokio::fs::rename(self.layout.silent_video(), self.layout.silent_output()).await?;
        Ok(())
    }

    fn final_path(&self, with_audio: bool) -> PathBuf {
        if with_audio {
            self.layout.muxed_video()
        } else {
            self.layout.silent_output()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeAssembler {
        audio: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAssembler {
        fn new(audio: bool) -> Self {
            Self {
                audio,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl VideoAssembler for FakeAssembler {
        async fn encode_frames(&self, _fps: f64, _nb_frames: u64) -> MediaResult<()> {
            self.record("encode");
            Ok(())
        }

        async fn has_audio(&self, _source: &Path) -> MediaResult<bool> {
            self.record("probe");
            Ok(self.audio)
        }

        async fn extract_audio(&self, _source: &Path) -> MediaResult<()> {
            self.record("extract");
            Ok(())
        }

        async fn mux_audio(&self) -> MediaResult<()> {
            self.record("mux");
            Ok(())
        }

        async fn finalize_silent(&self) -> MediaResult<()> {
            self.record("rename");
            Ok(())
        }

        fn final_path(&self, with_audio: bool) -> PathBuf {
            if with_audio {
                PathBuf::from("output/output_video.mp4")
            } else {
                PathBuf::from("output/video_output.mp4")
            }
        }
    }

    #[tokio::test]
    async fn test_assembly_with_audio_extracts_and_muxes() {
        let fake = FakeAssembler::new(true);
        let path = assemble_video(&fake, Path::new("in.mp4"), 25.0, 10)
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("output/output_video.mp4"));
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec!["encode", "probe", "extract", "mux"]
        );
    }

    #[tokio::test]
    async fn test_assembly_without_audio_renames_silent_container() {
        let fake = FakeAssembler::new(false);
        let path = assemble_video(&fake, Path::new("in.mp4"), 25.0, 10)
            .await
            .unwrap();

        assert_eq!(path, PathBuf::from("output/video_output.mp4"));
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec!["encode", "probe", "rename"]
        );
    }
}
