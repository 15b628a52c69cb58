//! Annotated bitmap returned by the inference service.

use std::io::Cursor;

use image::{ImageFormat, RgbImage};

use crate::error::{Result, ScreeningError};

/// Rebuild an RGB image from a packed BGR buffer.
///
/// Width and height come from the uploaded image, not from the buffer. Bytes
/// past `width * height * 3` are ignored.
pub fn decode_bitmap(data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .ok_or_else(|| {
            ScreeningError::ImageData(format!("Bitmap dimensions overflow: {width}x{height}"))
        })?;

    if data.len() < expected {
        return Err(ScreeningError::TruncatedImageBuffer {
            expected,
            actual: data.len(),
        });
    }

    let mut rgb = Vec::with_capacity(expected);
    for bgr in data[..expected].chunks_exact(3) {
        rgb.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ScreeningError::Internal("RGB buffer does not fit image".into()))
}

/// PNG-encode a decoded bitmap for storage.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_bgr_to_rgb() {
        let data = [1, 2, 3, 4, 5, 6];
        let image = decode_bitmap(&data, 2, 1).unwrap();

        assert_eq!(image.get_pixel(0, 0).0, [3, 2, 1]);
        assert_eq!(image.get_pixel(1, 0).0, [6, 5, 4]);
    }

    #[test]
    fn test_row_major_order() {
        let data: Vec<u8> = (0..12).collect();
        let image = decode_bitmap(&data, 2, 2).unwrap();

        assert_eq!(image.get_pixel(0, 1).0, [8, 7, 6]);
        assert_eq!(image.get_pixel(1, 1).0, [11, 10, 9]);
    }

    #[test]
    fn test_truncated_buffer() {
        let result = decode_bitmap(&[0; 11], 2, 2);
        assert!(matches!(
            result,
            Err(ScreeningError::TruncatedImageBuffer {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored_and_input_untouched() {
        let data = vec![9u8; 20];
        let image = decode_bitmap(&data, 2, 2).unwrap();
        assert_eq!(image.as_raw().len(), 12);
        assert_eq!(data, vec![9u8; 20]);
    }

    #[test]
    fn test_png_encoding() {
        let image = RgbImage::from_pixel(3, 2, image::Rgb([200, 10, 10]));
        let png = encode_png(&image).unwrap();

        assert_eq!(&png[1..4], b"PNG");
        let reloaded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(reloaded, image);
    }
}
