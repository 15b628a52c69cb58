//! Codec trait definitions.

use image::RgbImage;

use crate::error::Result;
use crate::RawImage;

use super::WireMessage;

/// Image geometries a codec accepts.
#[derive(Debug, Clone)]
pub struct CodecCapabilities {
    /// Accepted bytes per sample.
    pub byte_depths: &'static [u8],
    /// Accepted samples per pixel.
    pub channel_counts: &'static [u8],
}

/// Trait for the transcoding step on either side of the inference call.
pub trait Codec: Send + Sync {
    /// Encode a raw image into a wire message.
    fn encode(&self, image: &RawImage) -> Result<WireMessage>;

    /// Decode a returned bitmap into an RGB image.
    ///
    /// # Arguments
    /// * `data` - Raw bitmap bytes, already base64-decoded
    /// * `width` - Width of the originally uploaded image
    /// * `height` - Height of the originally uploaded image
    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<RgbImage>;

    /// Get codec capabilities.
    fn capabilities(&self) -> CodecCapabilities;

    /// Check whether the codec can encode the given image.
    fn can_encode(&self, image: &RawImage) -> bool {
        let caps = self.capabilities();
        caps.byte_depths.contains(&image.byte_depth)
            && caps.channel_counts.contains(&image.channels)
    }
}
