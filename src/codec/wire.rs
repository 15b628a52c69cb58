//! Binary wire message sent to the inference service.
//!
//! Layout, little-endian throughout:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 1    | header flags (depth, 2-D marker, channels) |
//! | 1      | 4    | height (u32)                            |
//! | 5      | 4    | width (u32)                             |
//! | 9      | 8    | spacing (2 x f32, 1.0)                  |
//! | 17     | 8    | origin (2 x f32, 0.0)                   |
//! | 25     | ...  | pixel data, verbatim                    |

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::RgbImage;

use crate::config::{channel_flag, PixelDepth, DIMENSIONALITY_FLAG};
use crate::error::{Result, ScreeningError};
use crate::{pixel_buffer_len, RawImage};

use super::bitmap::decode_bitmap;
use super::traits::{Codec, CodecCapabilities};

/// Size of the fixed part of a wire message.
pub const HEADER_LEN: usize = 1 + 4 + 4 + 2 * 4 + 2 * 4;

const SPACING: [f32; 2] = [1.0, 1.0];
const ORIGIN: [f32; 2] = [0.0, 0.0];

/// An encoded wire message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    bytes: Vec<u8>,
}

impl WireMessage {
    /// Wrap bytes received from elsewhere, checking the header and length.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let message = Self { bytes };
        let header = message.header()?;
        let expected = header
            .pixel_data_len()?
            .checked_add(HEADER_LEN)
            .ok_or_else(|| ScreeningError::ImageData("Wire message length overflows".into()))?;
        if message.bytes.len() != expected {
            return Err(ScreeningError::ImageData(format!(
                "Wire message length mismatch: expected {} bytes, got {}",
                expected,
                message.bytes.len()
            )));
        }
        Ok(message)
    }

    /// Full message bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the message, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total message length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the message is empty (never true for an encoded message).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Header flag byte.
    pub fn header_byte(&self) -> u8 {
        self.bytes.first().copied().unwrap_or_default()
    }

    /// Pixel section following the fixed header.
    pub fn pixel_data(&self) -> &[u8] {
        self.bytes.get(HEADER_LEN..).unwrap_or_default()
    }

    /// Parse the fixed header.
    pub fn header(&self) -> Result<WireHeader> {
        WireHeader::parse(&self.bytes)
    }
}

/// Decoded fixed part of a wire message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireHeader {
    /// Raw flag byte.
    pub flags: u8,
    /// Bytes per sample.
    pub depth: PixelDepth,
    /// Samples per pixel.
    pub channels: u8,
    /// Image height.
    pub height: u32,
    /// Image width.
    pub width: u32,
    /// Pixel spacing.
    pub spacing: [f32; 2],
    /// Image origin.
    pub origin: [f32; 2],
}

impl WireHeader {
    /// Parse the first `HEADER_LEN` bytes of a message.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ScreeningError::ImageData(format!(
                "Wire message too short: {} bytes, header needs {}",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let flags = cursor.read_u8()?;
        let depth = match flags & 0xF0 {
            16 => PixelDepth::One,
            48 => PixelDepth::Two,
            80 => PixelDepth::Four,
            other => {
                return Err(ScreeningError::ImageData(format!(
                    "Unknown depth flag {other:#04x} in header {flags:#04x}"
                )))
            }
        };
        if flags & DIMENSIONALITY_FLAG == 0 {
            return Err(ScreeningError::ImageData(format!(
                "Header {flags:#04x} lacks the 2-D marker"
            )));
        }
        let channels = match flags & 0x03 {
            2 => 3,
            3 => 4,
            other => {
                return Err(ScreeningError::ImageData(format!(
                    "Unknown channel flag {other} in header {flags:#04x}"
                )))
            }
        };

        let height = cursor.read_u32::<LittleEndian>()?;
        let width = cursor.read_u32::<LittleEndian>()?;
        let spacing = [
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
        ];
        let origin = [
            cursor.read_f32::<LittleEndian>()?,
            cursor.read_f32::<LittleEndian>()?,
        ];

        Ok(Self {
            flags,
            depth,
            channels,
            height,
            width,
            spacing,
            origin,
        })
    }

    /// Length of the pixel section this header describes.
    pub fn pixel_data_len(&self) -> Result<usize> {
        pixel_buffer_len(self.width, self.height, self.channels, self.depth.bytes())
    }
}

/// Codec for the inference service's wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

impl WireCodec {
    /// Create a new wire codec.
    pub fn new() -> Self {
        Self
    }

    /// Header flag byte for the given geometry.
    pub fn header_byte(byte_depth: u8, channels: u8) -> Result<u8> {
        let depth = PixelDepth::from_bytes(byte_depth)?;
        Ok(depth.header_flag() | DIMENSIONALITY_FLAG | channel_flag(channels)?)
    }
}

impl Codec for WireCodec {
    fn encode(&self, image: &RawImage) -> Result<WireMessage> {
        let header = Self::header_byte(image.byte_depth, image.channels)?;
        image.validate()?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + image.pixel_data.len());
        bytes.write_u8(header)?;
        bytes.write_u32::<LittleEndian>(image.height)?;
        bytes.write_u32::<LittleEndian>(image.width)?;
        for value in SPACING.iter().chain(ORIGIN.iter()) {
            bytes.write_f32::<LittleEndian>(*value)?;
        }
        bytes.extend_from_slice(&image.pixel_data);

        log::debug!(
            "Wire-encoded {}x{} image ({} ch, {} B/sample) to {} bytes, header {:#04x}",
            image.width,
            image.height,
            image.channels,
            image.byte_depth,
            bytes.len(),
            header
        );

        Ok(WireMessage { bytes })
    }

    fn decode(&self, data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
        decode_bitmap(data, width, height)
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            byte_depths: &[1, 2, 4],
            channel_counts: &[3, 4],
        }
    }
}
