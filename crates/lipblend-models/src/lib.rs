//! Shared data models for the LipBlend compositing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Frame indexing and the on-disk output layout
//! - 68-point facial landmark sets and the mouth-contour slice
//! - Inpainting relay endpoint configuration

pub mod landmarks;
pub mod layout;
pub mod relay;

// Re-export common types
pub use landmarks::{LandmarkError, LandmarkPoint, LandmarkSet, LANDMARK_COUNT};
pub use layout::{FrameIndex, OutputLayout, FRAME_INDEX_WIDTH};
pub use relay::{RelayConfigError, RelayEndpoint, DEFAULT_PAYLOAD_PATH};
