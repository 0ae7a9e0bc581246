//! HTTP client for the external image-inpainting relay.
//!
//! Per frame, the composited PNG and its mask are POSTed as data-URI base64
//! fields merged into the pass-through payload from the endpoint
//! configuration. The first image of the response replaces the persisted
//! frame. Every failure is typed and recoverable per-frame.

pub mod error;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lipblend_models::RelayEndpoint;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub use error::{RelayError, RelayResult};

/// Response body of the inpainting service.
#[derive(Debug, Deserialize)]
struct RelayResponse {
    images: Vec<String>,
}

/// Client for the inpainting relay endpoint.
#[derive(Debug, Clone)]
pub struct InpaintClient {
    endpoint: RelayEndpoint,
    client: reqwest::Client,
}

impl InpaintClient {
    pub fn new(endpoint: RelayEndpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    /// Send one frame/mask pair and return the refined frame as PNG bytes.
    pub async fn refine(&self, frame_png: &[u8], mask_png: &[u8]) -> RelayResult<Vec<u8>> {
        let body = self.build_body(frame_png, mask_png);

        debug!(url = %self.endpoint.url, "posting frame to inpaint relay");
        let response = self
            .client
            .post(&self.endpoint.url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RelayResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Malformed(e.to_string()))?;

        let first = parsed.images.first().ok_or(RelayError::EmptyResponse)?;
        decode_relay_image(first)
    }

    /// The pass-through payload with the per-frame image fields injected.
    fn build_body(&self, frame_png: &[u8], mask_png: &[u8]) -> Map<String, Value> {
        let mut body = self.endpoint.payload.clone();
        body.insert(
            "init_images".to_string(),
            Value::Array(vec![Value::String(data_uri(frame_png))]),
        );
        body.insert("mask".to_string(), Value::String(data_uri(mask_png)));
        body
    }
}

/// Encode PNG bytes as a data-URI base64 string.
fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

/// Decode one response image: strip an optional data-URI prefix, decode
/// base64, and verify the bytes decode as an image.
fn decode_relay_image(encoded: &str) -> RelayResult<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    let bytes = BASE64.decode(payload)?;
    image::load_from_memory(&bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// A 1x1 white PNG for round-tripping through the relay.
    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
        bytes
    }

    fn endpoint(url: &str) -> RelayEndpoint {
        serde_json::from_value(json!({
            "url": url,
            "payload": { "steps": 20 }
        }))
        .unwrap()
    }

    #[test]
    fn test_body_injects_images_and_keeps_payload() {
        let client = InpaintClient::new(endpoint("http://localhost:7860/"));
        let body = client.build_body(b"frame", b"mask");

        assert_eq!(body["steps"], 20);
        assert!(body["init_images"][0]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert!(body["mask"].as_str().unwrap().contains("base64,"));
    }

    #[test]
    fn test_decode_strips_data_uri_prefix() {
        let png = tiny_png();
        let plain = BASE64.encode(&png);
        let prefixed = format!("data:image/png;base64,{plain}");

        assert_eq!(decode_relay_image(&plain).unwrap(), png);
        assert_eq!(decode_relay_image(&prefixed).unwrap(), png);
    }

    #[test]
    fn test_decode_rejects_non_image_payload() {
        let garbage = BASE64.encode(b"not an image");
        assert!(matches!(
            decode_relay_image(&garbage),
            Err(RelayError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_refine_returns_first_response_image() {
        let server = MockServer::start().await;
        let png = tiny_png();

        Mock::given(method("POST"))
            .and(path("/sdapi/v1/img2img"))
            .and(body_partial_json(json!({ "steps": 20 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [BASE64.encode(&png)]
            })))
            .mount(&server)
            .await;

        let client = InpaintClient::new(endpoint(&format!("{}/sdapi/v1/img2img", server.uri())));
        let refined = client.refine(&png, &png).await.unwrap();
        assert_eq!(refined, png);
    }

    #[tokio::test]
    async fn test_refine_empty_images_is_typed_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": [] })))
            .mount(&server)
            .await;

        let client = InpaintClient::new(endpoint(&server.uri()));
        assert!(matches!(
            client.refine(b"f", b"m").await,
            Err(RelayError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_refine_http_error_is_recoverable_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = InpaintClient::new(endpoint(&server.uri()));
        assert!(matches!(
            client.refine(b"f", b"m").await,
            Err(RelayError::Status { status: 500, .. })
        ));
    }
}
