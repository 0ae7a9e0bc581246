//! Inpainting relay endpoint configuration.
//!
//! Loaded from a JSON payload file with two top-level fields: the endpoint
//! URL and an opaque payload object forwarded verbatim to the service. The
//! URL is validated at load time; the payload map is pass-through so
//! relay-specific knobs (sampler, steps, ControlNet units, ...) stay out of
//! this codebase.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Fixed payload file path read when post-processing is enabled.
pub const DEFAULT_PAYLOAD_PATH: &str = "payloads/controlNet.json";

/// Result type for relay configuration loading.
pub type RelayConfigResult<T> = Result<T, RelayConfigError>;

/// Errors produced while loading the relay payload file.
#[derive(Debug, Error)]
pub enum RelayConfigError {
    #[error("failed to read payload file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("payload file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid relay URL {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
}

/// Relay endpoint: validated URL plus the opaque request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEndpoint {
    /// Endpoint URL the composited frame and mask are POSTed to.
    pub url: String,

    /// Pass-through payload object; image fields are injected per frame.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl RelayEndpoint {
    /// Load and validate the endpoint from a JSON payload file.
    pub fn load(path: impl AsRef<Path>) -> RelayConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RelayConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let endpoint: RelayEndpoint = serde_json::from_str(&raw)?;
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Validate the endpoint URL.
    pub fn validate(&self) -> RelayConfigResult<()> {
        Url::parse(&self.url).map_err(|source| RelayConfigError::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_file_shape() {
        let raw = r#"{
            "url": "http://127.0.0.1:7860/sdapi/v1/img2img",
            "payload": {
                "denoising_strength": 0.75,
                "steps": 20,
                "alwayson_scripts": { "controlnet": { "args": [] } }
            }
        }"#;
        let endpoint: RelayEndpoint = serde_json::from_str(raw).unwrap();
        endpoint.validate().unwrap();
        assert_eq!(endpoint.payload["steps"], 20);
    }

    #[test]
    fn test_missing_payload_defaults_empty() {
        let endpoint: RelayEndpoint =
            serde_json::from_str(r#"{"url": "http://localhost:7860/"}"#).unwrap();
        assert!(endpoint.payload.is_empty());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let endpoint: RelayEndpoint =
            serde_json::from_str(r#"{"url": "not a url"}"#).unwrap();
        assert!(matches!(
            endpoint.validate(),
            Err(RelayConfigError::InvalidUrl { .. })
        ));
    }
}
