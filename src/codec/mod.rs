//! Transcoding between raw images and the inference service's formats.
//!
//! - `wire`: raw pixel buffer to the length-prefixed binary message
//! - `bitmap`: returned BGR bitmap back to an RGB image

mod bitmap;
mod traits;
mod wire;

pub use bitmap::{decode_bitmap, encode_png};
pub use traits::{Codec, CodecCapabilities};
pub use wire::{WireCodec, WireHeader, WireMessage, HEADER_LEN};
