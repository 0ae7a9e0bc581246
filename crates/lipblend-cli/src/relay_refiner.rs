//! Adapter plugging the inpainting relay client into the frame loop.

use async_trait::async_trait;
use lipblend_media::{FrameRefiner, MediaError, MediaResult};
use lipblend_relay::InpaintClient;

pub struct RelayRefiner {
    client: InpaintClient,
}

impl RelayRefiner {
    pub fn new(client: InpaintClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FrameRefiner for RelayRefiner {
    async fn refine(&self, frame_png: &[u8], mask_png: &[u8]) -> MediaResult<Vec<u8>> {
        self.client
            .refine(frame_png, mask_png)
            .await
            .map_err(|e| MediaError::relay_failed(e.to_string()))
    }
}
