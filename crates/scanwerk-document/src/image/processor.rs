// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: page fitting and JPEG encoding of captured rasters.
// Operates on in-memory images using the `image` crate.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use scanwerk_core::error::ScanError;
use tracing::{debug, info, instrument};

/// JPEG quality used when none is specified. Matches the libjpeg default.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Processing pipeline operating on a single captured image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`
/// wrapping the transformed image, enabling method chaining.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(captured)
///     .fit_to_page(1058, 1496)
///     .to_jpeg_bytes(DEFAULT_JPEG_QUALITY)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Shrink the image so it fits within `page_width` x `page_height`
    /// pixels, preserving aspect ratio. Images that already fit are returned
    /// untouched, so fitting twice is the same as fitting once.
    ///
    /// Uses Lanczos3 filtering; this is the one place where resampling
    /// quality shows up in the delivered document.
    #[instrument(skip(self), fields(page_width, page_height))]
    pub fn fit_to_page(self, page_width: u32, page_height: u32) -> Self {
        let (width, height) = (self.image.width(), self.image.height());
        let Some((new_w, new_h)) = fitted_dimensions(width, height, page_width, page_height)
        else {
            debug!(width, height, "image already fits page");
            return self;
        };

        info!(
            from_w = width,
            from_h = height,
            to_w = new_w,
            to_h = new_h,
            "Resizing image to fit page"
        );
        let resized = self.image.resize_exact(new_w, new_h, FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Encode the current image as baseline RGB JPEG with the given quality
    /// (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, ScanError> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| ScanError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

/// Dimensions a `width` x `height` image must be resized to so that it fits
/// the page, or `None` if it already fits.
///
/// When the image overflows, the binding constraint is whichever dimension
/// overflows by the larger ratio; scaling by it keeps both dimensions within
/// bounds while leaving the image as large as possible.
pub fn fitted_dimensions(
    width: u32,
    height: u32,
    page_width: u32,
    page_height: u32,
) -> Option<(u32, u32)> {
    if width <= page_width && height <= page_height {
        return None;
    }

    let width_excess = f64::from(width) / f64::from(page_width);
    let height_excess = f64::from(height) / f64::from(page_height);

    if width_excess >= height_excess {
        let scaled = (f64::from(height) / width_excess).round() as u32;
        Some((page_width, scaled.clamp(1, page_height)))
    } else {
        let scaled = (f64::from(width) / height_excess).round() as u32;
        Some((scaled.clamp(1, page_width), page_height))
    }
}

// -- Tests --------------------------------------------------------------------
