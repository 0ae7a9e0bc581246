//! Frame indexing and the on-disk output layout.
//!
//! Output files are named with a fixed-width, zero-padded decimal frame index
//! so that lexical and numeric ordering coincide. The presence of the final
//! per-frame output file is the checkpoint marker for that index.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Width of the zero-padded frame index in file names.
pub const FRAME_INDEX_WIDTH: usize = 5;

/// A 0-based, monotonically increasing frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIndex(u64);

impl FrameIndex {
    pub const ZERO: FrameIndex = FrameIndex(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The index that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Zero-padded decimal form used in file names, e.g. `00042`.
    pub fn padded(&self) -> String {
        format!("{:0width$}", self.0, width = FRAME_INDEX_WIDTH)
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed output directory layout.
///
/// Beneath a configurable root (default `output`):
/// - `output_NNNNN.png` — final per-frame output, checkpoint marker
/// - `images/image_NNNNN.png` — pre-relay composite
/// - `masks/image_NNNNN.png` — blurred mouth mask
/// - `video.avi`, `output_audio.aac`, `output_video.mp4`, `video_output.mp4`
///   — assembly artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLayout {
    root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new("output")
    }
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn masks_dir(&self) -> PathBuf {
        self.root.join("masks")
    }

    /// Final per-frame output; its presence marks the index complete.
    pub fn output_frame(&self, index: FrameIndex) -> PathBuf {
        self.root.join(format!("output_{}.png", index.padded()))
    }

    /// Pre-relay composited frame.
    pub fn intermediate_image(&self, index: FrameIndex) -> PathBuf {
        self.images_dir().join(format!("image_{}.png", index.padded()))
    }

    /// Blurred mouth mask for the frame.
    pub fn mask_image(&self, index: FrameIndex) -> PathBuf {
        self.masks_dir().join(format!("image_{}.png", index.padded()))
    }

    /// FFmpeg input pattern for the final frame sequence.
    pub fn frame_pattern(&self) -> PathBuf {
        self.root.join(format!("output_%0{}d.png", FRAME_INDEX_WIDTH))
    }

    /// Silent container encoded from the frame sequence.
    pub fn silent_video(&self) -> PathBuf {
        self.root.join("video.avi")
    }

    /// Audio track extracted from the lip-synced source.
    pub fn audio_track(&self) -> PathBuf {
        self.root.join("output_audio.aac")
    }

    /// Final output when audio was remuxed.
    pub fn muxed_video(&self) -> PathBuf {
        self.root.join("output_video.mp4")
    }

    /// Final output when the source had no audio (renamed silent container).
    pub fn silent_output(&self) -> PathBuf {
        self.root.join("video_output.mp4")
    }
}
