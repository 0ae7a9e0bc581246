//! Synchronized video frame sources.
//!
//! The loop consumes two sources in lock-step, one frame per iteration.
//! `FrameSource` is the seam that lets tests drive the loop with synthetic
//! frames instead of real video files.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::{MatTraitConst, VideoCaptureTrait, VideoCaptureTraitConst};
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT,
};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// A sequential source of BGR frames.
pub trait FrameSource: Send {
    /// The next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> MediaResult<Option<Mat>>;

    /// Advance past one frame without decoding it. Returns `false` when the
    /// source is exhausted. Used by the skip path to keep two sources
    /// synchronized over already-completed indices.
    fn skip_frame(&mut self) -> MediaResult<bool>;
}

/// Frame source backed by an OpenCV `VideoCapture`.
pub struct VideoFrameStream {
    cap: VideoCapture,
    path: PathBuf,
}

impl VideoFrameStream {
    /// Open a video file for sequential reading.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let cap = VideoCapture::from_file(&path.to_string_lossy(), CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(MediaError::InvalidVideo(format!(
                "failed to open video file: {}",
                path.display()
            )));
        }

        debug!("Opened video stream: {}", path.display());
        Ok(Self {
            cap,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container-reported frame count; 0 when unknown.
    pub fn frame_count(&self) -> u64 {
        self.cap
            .get(CAP_PROP_FRAME_COUNT)
            .map(|v| v.max(0.0) as u64)
            .unwrap_or(0)
    }

    /// Container-reported frame rate; 0.0 when unknown.
    pub fn fps(&self) -> f64 {
        self.cap.get(CAP_PROP_FPS).unwrap_or(0.0)
    }
}

impl FrameSource for VideoFrameStream {
    fn next_frame(&mut self) -> MediaResult<Option<Mat>> {
        let mut frame = Mat::default();
        let read = self.cap.read(&mut frame)?;
        if !read || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        Ok(self.cap.grab()?)
    }
}
