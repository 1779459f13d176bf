//! Page image encoding
//!
//! Captured pages are opaque, so both encoders drop the alpha channel and
//! write 8-bit RGB. Page files use PNG so that a page read back from disk is
//! pixel-identical to the capture; the assembled PDF embeds JPEG.
//!
//! ```
//! use page_capture::{capture::ImageBuffer, util::encode::encode_png};
//!
//! let page = ImageBuffer::from_page_pattern(640, 480, 3);
//! let png_bytes = encode_png(&page).unwrap();
//! assert_eq!(&png_bytes[1..4], b"PNG");
//! ```

use std::io::Cursor;

use image::{
    ExtendedColorType,
    ImageEncoder,
    RgbImage,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
    },
};

use crate::{
    capture::ImageBuffer,
    error::{CaptureError, CaptureResult},
};

/// Encodes a page as PNG for the page store
pub fn encode_png(page: &ImageBuffer) -> CaptureResult<Vec<u8>> {
    encode_png_with_compression(page, CompressionType::Default)
}

/// Encodes a page as PNG trading size for speed via `compression`
pub fn encode_png_with_compression(page: &ImageBuffer, compression: CompressionType) -> CaptureResult<Vec<u8>> {
    encode_rgb(page, "png", |out, rgb| {
        PngEncoder::new_with_quality(out, compression, FilterType::Adaptive).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
    })
}

/// Encodes a page as JPEG for embedding in a PDF
///
/// `quality` is clamped to 1-100.
///
/// ```
/// use page_capture::{capture::ImageBuffer, util::encode::encode_jpeg};
///
/// let page = ImageBuffer::from_test_pattern(100, 100);
/// let jpeg = encode_jpeg(&page, 90).unwrap();
/// assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
/// ```
pub fn encode_jpeg(page: &ImageBuffer, quality: u8) -> CaptureResult<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    encode_rgb(page, "jpeg", |out, rgb| {
        JpegEncoder::new_with_quality(out, quality).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
    })
}

/// Converts `page` to RGB and runs `write` into a fresh buffer
fn encode_rgb<F>(page: &ImageBuffer, format: &str, write: F) -> CaptureResult<Vec<u8>>
where
    F: FnOnce(Cursor<&mut Vec<u8>>, &RgbImage) -> image::ImageResult<()>,
{
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return Err(CaptureError::InvalidParameter {
            parameter: "page".to_string(),
            reason:    format!("cannot encode an empty {}x{} page", width, height),
        });
    }

    let rgb = page.inner().to_rgb8();
    let mut output = Vec::new();
    write(Cursor::new(&mut output), &rgb).map_err(|e| CaptureError::EncodingFailed {
        format: format.to_string(),
        reason: e.to_string(),
    })?;

    tracing::trace!("Encoded {}x{} page as {} ({} bytes)", width, height, format, output.len());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use image::GenericImageView;

    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

    #[test]
    fn test_png_page_reads_back_identical() {
        let page = ImageBuffer::from_page_pattern(120, 80, 42);
        let bytes = encode_png(&page).unwrap();
        assert_eq!(&bytes[0..8], &PNG_SIGNATURE);

        let decoded = ImageBuffer::new(image::load_from_memory(&bytes).unwrap());
        assert!(decoded.same_pixels(&page));
    }

    #[test]
    fn test_png_drops_alpha() {
        let page = ImageBuffer::from_test_pattern(16, 16);
        let decoded = image::load_from_memory(&encode_png(&page).unwrap()).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_png_fast_compression() {
        let page = ImageBuffer::from_page_pattern(300, 200, 9);
        let fast = encode_png_with_compression(&page, CompressionType::Fast).unwrap();
        let decoded = ImageBuffer::new(image::load_from_memory(&fast).unwrap());
        assert!(decoded.same_pixels(&page));
    }

    #[test]
    fn test_jpeg_keeps_page_size() {
        let page = ImageBuffer::from_test_pattern(320, 200);
        let bytes = encode_jpeg(&page, 85).unwrap();

        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (320, 200));
    }

    #[test]
    fn test_jpeg_quality_clamped() {
        let page = ImageBuffer::from_test_pattern(50, 50);
        assert!(encode_jpeg(&page, 0).is_ok());
        assert!(encode_jpeg(&page, 255).is_ok());
    }

    #[test]
    fn test_empty_page_rejected() {
        let page = ImageBuffer::new(image::DynamicImage::new_rgba8(0, 0));
        assert!(matches!(encode_jpeg(&page, 90), Err(CaptureError::InvalidParameter { .. })));
        assert!(matches!(encode_png(&page), Err(CaptureError::InvalidParameter { .. })));
    }
}
