//! Mouth-region compositing for lip-sync output.
//!
//! This crate provides:
//! - Soft mouth-mask construction from 68-point facial landmarks
//! - Alpha-blend compositing of synthesized frames into original frames
//! - A checkpointed, resumable frame-sequential processing loop
//! - Type-safe FFmpeg command building, probing, and final video assembly
//!
//! The OpenCV-backed modules (detection, masking, compositing, frame
//! streams, the loop itself) are behind the default `opencv` feature.

pub mod assemble;
pub mod checkpoint;
pub mod command;
#[cfg(feature = "opencv")]
pub mod composite;
#[cfg(feature = "opencv")]
pub mod detect;
pub mod error;
#[cfg(feature = "opencv")]
pub mod mask;
#[cfg(feature = "opencv")]
pub mod pipeline;
pub mod probe;
#[cfg(feature = "opencv")]
pub mod stream;

pub use assemble::{assemble_video, FfmpegAssembler, VideoAssembler};
pub use checkpoint::{CheckpointStore, DirCheckpointStore};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
#[cfg(feature = "opencv")]
pub use composite::blend_through_mask;
#[cfg(feature = "opencv")]
pub use detect::{LandmarkDetector, OnnxLandmarkDetector};
pub use error::{MediaError, MediaResult};
#[cfg(feature = "opencv")]
pub use mask::MouthMaskBuilder;
#[cfg(feature = "opencv")]
pub use pipeline::{CheckpointedFrameLoop, FrameLoopSummary, FrameRefiner};
pub use probe::{has_audio_stream, probe_video, VideoInfo};
#[cfg(feature = "opencv")]
pub use stream::{FrameSource, VideoFrameStream};
