//! Captured frames
//!
//! [`ImageBuffer`] wraps `image::DynamicImage` with what the capture loop
//! does to a frame: trim the reader's chrome and compare it with the
//! previous page.
//!
//! ```
//! use page_capture::{capture::ImageBuffer, config::CropMargins};
//!
//! let window = ImageBuffer::from_test_pattern(1200, 900);
//! let page = window.crop_margins(&CropMargins::default());
//! assert_eq!(page.dimensions(), (1200 - 280 - 50, 900 - 80 - 50));
//! ```

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::config::CropMargins;

/// Rows per synthetic text line, of which the last third is ink
const LINE_PITCH: u32 = 12;

/// A captured window or page image
///
/// Transformations return a new buffer and leave `self` untouched.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    inner: DynamicImage,
}

impl ImageBuffer {
    pub fn new(image: DynamicImage) -> Self {
        Self { inner: image }
    }

    /// Trims fixed margins from each edge to leave only the page content
    ///
    /// If the margins would leave nothing (window smaller than the margins),
    /// the image is returned uncropped.
    pub fn crop_margins(&self, margins: &CropMargins) -> Self {
        let (width, height) = self.dimensions();
        let right = width.saturating_sub(margins.right);
        let bottom = height.saturating_sub(margins.bottom);

        if right <= margins.left || bottom <= margins.top {
            tracing::debug!(
                "Margins {:?} exceed {}x{} capture, keeping it uncropped",
                margins,
                width,
                height
            );
            return self.clone();
        }

        Self::new(self.inner.crop_imm(
            margins.left,
            margins.top,
            right - margins.left,
            bottom - margins.top,
        ))
    }

    /// Returns true when both images have the same size and pixels
    pub fn same_pixels(&self, other: &ImageBuffer) -> bool {
        self.dimensions() == other.dimensions() && self.to_rgba8().as_raw() == other.to_rgba8().as_raw()
    }

    /// (width, height) in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        self.inner.to_rgba8()
    }

    /// A blank page of ruled lines, for exercising the pipeline without a
    /// real backend
    pub fn from_test_pattern(width: u32, height: u32) -> Self {
        Self::from_page_pattern(width, height, 0)
    }

    /// A synthetic book page whose paper tint encodes `seed`
    ///
    /// Paper pixels carry `seed % 256` in the blue channel, so two patterns
    /// with different seeds (mod 256) never compare equal. Every
    /// [`LINE_PITCH`] rows a dark text line is drawn, indented by the seed so
    /// neighbouring pages also differ in layout.
    pub fn from_page_pattern(width: u32, height: u32, seed: u32) -> Self {
        let tint = (seed % 256) as u8;
        let paper = Rgba([250, 246, tint, 255]);
        let ink = Rgba([30, 30, 30, 255]);
        let indent = (seed % 7) * 4;

        let img = RgbaImage::from_fn(width, height, |x, y| {
            let in_line = y % LINE_PITCH >= LINE_PITCH * 2 / 3;
            let in_column = x >= indent && x + indent < width;
            if in_line && in_column { ink } else { paper }
        });

        Self::from(img)
    }

    pub fn inner(&self) -> &DynamicImage {
        &self.inner
    }
}

impl From<RgbaImage> for ImageBuffer {
    fn from(image: RgbaImage) -> Self {
        Self::new(DynamicImage::ImageRgba8(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_margins_default() {
        let img = ImageBuffer::from_test_pattern(1280, 800);
        let page = img.crop_margins(&CropMargins::default());
        assert_eq!(page.dimensions(), (1280 - 330, 800 - 130));
    }

    #[test]
    fn test_crop_margins_keeps_content_pixels() {
        let img = ImageBuffer::from_page_pattern(600, 400, 7);
        let margins = CropMargins {
            left:   10,
            top:    20,
            right:  30,
            bottom: 40,
        };
        let page = img.crop_margins(&margins);
        assert_eq!(page.dimensions(), (560, 340));
        // Row 0 of the crop is row 20 of the source
        for (x, y) in [(0, 0), (5, 3), (100, 8)] {
            assert_eq!(page.to_rgba8().get_pixel(x, y), img.to_rgba8().get_pixel(x + 10, y + 20));
        }
    }

    #[test]
    fn test_crop_margins_too_large_keeps_original() {
        let img = ImageBuffer::from_test_pattern(300, 100);
        let page = img.crop_margins(&CropMargins::default());
        assert_eq!(page.dimensions(), (300, 100));
    }

    #[test]
    fn test_crop_margins_zero_is_identity() {
        let img = ImageBuffer::from_test_pattern(64, 48);
        let page = img.crop_margins(&CropMargins::none());
        assert!(page.same_pixels(&img));
    }

    #[test]
    fn test_same_pixels() {
        let a = ImageBuffer::from_page_pattern(50, 50, 1);
        let b = ImageBuffer::from_page_pattern(50, 50, 1);
        let c = ImageBuffer::from_page_pattern(50, 50, 2);
        let d = ImageBuffer::from_page_pattern(50, 40, 1);

        assert!(a.same_pixels(&b));
        assert!(!a.same_pixels(&c));
        assert!(!a.same_pixels(&d));
    }

    #[test]
    fn test_same_pixels_across_color_types() {
        let rgba = ImageBuffer::from_page_pattern(20, 20, 5);
        let rgb = ImageBuffer::new(DynamicImage::ImageRgb8(rgba.inner().to_rgb8()));
        assert!(rgba.same_pixels(&rgb));
    }

    #[test]
    fn test_page_pattern_has_text_lines() {
        let img = ImageBuffer::from_page_pattern(40, 24, 0).to_rgba8();
        assert_eq!(img.get_pixel(10, 0), &Rgba([250, 246, 0, 255]));
        assert_eq!(img.get_pixel(10, 9), &Rgba([30, 30, 30, 255]));
    }

    #[test]
    fn test_from_rgba_image() {
        let img = ImageBuffer::from(RgbaImage::new(20, 10));
        assert_eq!(img.dimensions(), (20, 10));
    }
}
