//! Typed view of the inference service's JSON response.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::config::{ScreeningConfig, DEFAULT_MAX_STRING_LENGTH};
use crate::error::{Result, ScreeningError};

/// Annotated image returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerImage {
    /// Base64-encoded packed BGR bitmap.
    pub bitmap: String,
}

/// Parsed inference response.
///
/// Each measurement list holds the neuroretinal rim value at index 0 and the
/// excavation (cup) value at index 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResult {
    /// Annotated bitmap.
    pub image: ServerImage,
    /// Contour coordinates.
    #[serde(default)]
    pub coordinates: Vec<f64>,
    /// Rim and cup distances.
    pub distances: Vec<f64>,
    /// Rim and cup perimeters.
    pub perimeters: Vec<f64>,
    /// Rim and cup areas.
    pub areas: Vec<f64>,
}

impl ServerResult {
    /// Decode the base64 bitmap into raw bytes.
    pub fn bitmap_bytes(&self) -> Result<Vec<u8>> {
        let encoded = self.image.bitmap.as_str();
        let decoded = if encoded.bytes().any(|b| b.is_ascii_whitespace()) {
            let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            STANDARD.decode(compact)
        } else {
            STANDARD.decode(encoded)
        };

        decoded.map_err(|e| {
            ScreeningError::MalformedServerResponse(format!("image.bitmap is not valid base64: {e}"))
        })
    }
}

/// Parser for response bodies.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    max_string_length: usize,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STRING_LENGTH)
    }
}

impl ResponseParser {
    /// Create a parser accepting strings up to `max_string_length` characters.
    pub fn new(max_string_length: usize) -> Self {
        Self { max_string_length }
    }

    /// Create a parser from the pipeline configuration.
    pub fn from_config(config: &ScreeningConfig) -> Self {
        Self::new(config.max_string_length)
    }

    /// Maximum accepted string length.
    pub fn max_string_length(&self) -> usize {
        self.max_string_length
    }

    /// Parse a response body.
    pub fn parse(&self, body: &str) -> Result<ServerResult> {
        let result: ServerResult = serde_json::from_str(body)
            .map_err(|e| ScreeningError::MalformedServerResponse(e.to_string()))?;

        let bitmap_len = result.image.bitmap.len();
        if bitmap_len > self.max_string_length {
            return Err(ScreeningError::MalformedServerResponse(format!(
                "image.bitmap is {} characters, limit is {}",
                bitmap_len, self.max_string_length
            )));
        }

        log::debug!(
            "Parsed response: bitmap {} chars, {} coordinates, {}/{}/{} measurements",
            bitmap_len,
            result.coordinates.len(),
            result.distances.len(),
            result.perimeters.len(),
            result.areas.len()
        );

        Ok(result)
    }
}
