//! Fundus Screening Library
//!
//! Transcodes fundus photographs into the compact binary wire format understood by
//! the optic-disc inference service, decodes its annotated bitmap response and turns
//! the returned contour measurements into a DDLS stage and clinical status.
//!
//! # Features
//!
//! - **Wire Codec**: bit-exact header/dimension/spacing layout followed by raw pixels
//! - **Inference Client**: single-shot blocking POST with explicit timeout and classified failures
//! - **Typed Responses**: missing measurement arrays are errors, never silent defaults
//! - **DDLS Scoring**: 3-decimal half-up ratios, 6-level stage, 3-level status
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fundus_screen::{HttpWireClient, LocalImageStore, ScreeningConfig, ScreeningPipeline};
//!
//! let config = ScreeningConfig::load("screening.toml")?;
//! let client = HttpWireClient::new(&config)?;
//! let store = LocalImageStore::new(&config.bucket)?;
//!
//! let pipeline = ScreeningPipeline::new(config, client, store);
//! let result = pipeline.screen_file("fundus.png")?;
//! println!("Stage {} ({})", result.stage, result.status);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod response;
pub mod storage;

// Re-export commonly used types
pub use client::{HttpWireClient, WireClient};
pub use codec::{decode_bitmap, Codec, WireCodec, WireMessage};
pub use config::{PixelDepth, ScreeningConfig};
pub use error::{FailureCategory, Result, ScreeningError};
pub use metrics::{calculate_ratio, ClinicalStatus, DdlsStage, RatioSet, ScreeningMetrics};
pub use pipeline::{PipelineBuilder, ScreeningPipeline, ScreeningResult};
pub use response::{ResponseParser, ServerResult};
pub use storage::{ImageStore, LocalImageStore};

use image::DynamicImage;

/// Raw pixel buffer with the geometry the wire codec needs.
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Image height in pixels.
    pub height: u32,
    /// Image width in pixels.
    pub width: u32,
    /// Samples per pixel (1, 3 or 4).
    pub channels: u8,
    /// Bytes per sample (1, 2 or 4).
    pub byte_depth: u8,
    /// Interleaved pixel data, row-major.
    pub pixel_data: Vec<u8>,
}

impl RawImage {
    /// Create a validated raw image.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        byte_depth: u8,
        pixel_data: Vec<u8>,
    ) -> Result<Self> {
        let image = Self {
            height,
            width,
            channels,
            byte_depth,
            pixel_data,
        };
        image.validate()?;
        Ok(image)
    }

    /// Decode an uploaded image file (PNG, JPEG, ...) into a raw buffer.
    ///
    /// Grayscale inputs are promoted to 8-bit RGB since the wire format has no
    /// single-channel encoding.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = (decoded.width(), decoded.height());

        let (channels, byte_depth, pixel_data) = match decoded {
            DynamicImage::ImageRgb8(img) => (3, 1, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, 1, img.into_raw()),
            DynamicImage::ImageRgb16(img) => (3, 2, le_bytes_u16(img.as_raw())),
            DynamicImage::ImageRgba16(img) => (4, 2, le_bytes_u16(img.as_raw())),
            DynamicImage::ImageRgb32F(img) => (3, 4, le_bytes_f32(img.as_raw())),
            DynamicImage::ImageRgba32F(img) => (4, 4, le_bytes_f32(img.as_raw())),
            other => {
                log::debug!("Promoting {:?} input to 8-bit RGB", other.color());
                (3, 1, other.to_rgb8().into_raw())
            }
        };

        Self::new(width, height, channels, byte_depth, pixel_data)
    }

    /// Calculate the expected size of pixel data in bytes.
    ///
    /// Fails with `ImageData` when the geometry does not fit in `usize`.
    pub fn expected_size(&self) -> Result<usize> {
        pixel_buffer_len(self.width, self.height, self.channels, self.byte_depth as usize)
    }

    /// Validate channel count, byte depth and buffer length.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(ScreeningError::UnsupportedChannelCount(self.channels));
        }
        PixelDepth::from_bytes(self.byte_depth)?;

        let expected = self.expected_size()?;
        if self.pixel_data.len() != expected {
            return Err(ScreeningError::ImageData(format!(
                "Pixel data size mismatch: expected {} bytes, got {}",
                expected,
                self.pixel_data.len()
            )));
        }
        Ok(())
    }
}

/// Byte length of a `width` x `height` buffer, rejecting overflow.
pub(crate) fn pixel_buffer_len(
    width: u32,
    height: u32,
    channels: u8,
    bytes_per_sample: usize,
) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels as usize))
        .and_then(|n| n.checked_mul(bytes_per_sample))
        .ok_or_else(|| {
            ScreeningError::ImageData(format!(
                "Image geometry overflows: {width}x{height}, {channels} ch, {bytes_per_sample} B/sample"
            ))
        })
}

fn le_bytes_u16(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn le_bytes_f32(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Library version information.
pub mod version {
    /// Library version string.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Library name.
    pub const NAME: &str = env!("CARGO_PKG_NAME");

    /// Get full version string.
    pub fn full_version() -> String {
        format!("{} {}", NAME, VERSION)
    }
}
