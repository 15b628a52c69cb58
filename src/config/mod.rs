//! Configuration types for the screening pipeline and the wire encoding.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScreeningError};

/// Default request timeout for the inference service.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default ceiling on string lengths in server responses.
///
/// Returned bitmaps are tens of megabytes of base64, so this is effectively unbounded.
pub const DEFAULT_MAX_STRING_LENGTH: usize = 100_000_000;

/// Default storage bucket (a directory for the local store).
pub const DEFAULT_BUCKET: &str = "screenings";

/// Bytes per sample supported by the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelDepth {
    /// 8-bit samples.
    One,
    /// 16-bit samples.
    Two,
    /// 32-bit samples.
    Four,
}

impl PixelDepth {
    /// Parse from a byte count.
    pub fn from_bytes(bytes: u8) -> Result<Self> {
        match bytes {
            1 => Ok(PixelDepth::One),
            2 => Ok(PixelDepth::Two),
            4 => Ok(PixelDepth::Four),
            other => Err(ScreeningError::UnsupportedPixelDepth(other)),
        }
    }

    /// Number of bytes per sample.
    pub fn bytes(&self) -> usize {
        match self {
            PixelDepth::One => 1,
            PixelDepth::Two => 2,
            PixelDepth::Four => 4,
        }
    }

    /// Header flag contributed by this depth.
    pub fn header_flag(&self) -> u8 {
        match self {
            PixelDepth::One => 16,
            PixelDepth::Two => 48,
            PixelDepth::Four => 80,
        }
    }
}

/// Wire header flag marking a 2-D single-timepoint image.
pub const DIMENSIONALITY_FLAG: u8 = 4;

/// Header flag for a channel count, if the wire format supports it.
pub fn channel_flag(channels: u8) -> Result<u8> {
    match channels {
        3 => Ok(2),
        4 => Ok(3),
        other => Err(ScreeningError::UnsupportedChannelCount(other)),
    }
}

/// Configuration for a screening pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Inference service endpoint receiving the wire message.
    pub endpoint_url: String,
    /// Storage bucket for annotated bitmaps.
    pub bucket: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum accepted string length in server responses.
    pub max_string_length: usize,
    /// User agent sent to the inference service.
    pub user_agent: String,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            user_agent: crate::version::full_version().replace(' ', "/"),
        }
    }
}

impl ScreeningConfig {
    /// Create a configuration for the given endpoint with default settings.
    pub fn for_endpoint(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScreeningConfig =
            toml::from_str(text).map_err(|e| ScreeningError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ScreeningError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Check the configuration for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint_url.trim();
        if endpoint.is_empty() {
            return Err(ScreeningError::Config("endpoint_url must be set".into()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ScreeningError::Config(format!(
                "endpoint_url must be an http(s) URL, got {endpoint}"
            )));
        }
        if self.bucket.trim().is_empty() {
            return Err(ScreeningError::Config("bucket must not be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ScreeningError::Config("timeout_ms must be positive".into()));
        }
        if self.max_string_length == 0 {
            return Err(ScreeningError::Config(
                "max_string_length must be positive".into(),
            ));
        }
        Ok(())
    }
}
