//! Relay error types.

use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors from the inpainting relay round-trip. All of these are
/// recoverable per-frame: the caller keeps the pre-relay composite.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("relay response had an unexpected shape: {0}")]
    Malformed(String),

    #[error("relay response contained no images")]
    EmptyResponse,

    #[error("relay image is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("relay image is not a decodable image: {0}")]
    InvalidImage(#[from] image::ImageError),
}
