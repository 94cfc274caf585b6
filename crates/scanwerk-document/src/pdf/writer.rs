// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: wrap a scanned image in a single-page PDF using `lopdf`.
//
// The image is JPEG-encoded and embedded unchanged as a DCTDecode XObject, so
// the document carries exactly the bytes the JPEG encoder produced.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use scanwerk_core::error::ScanError;
use tracing::{debug, info, instrument};

use crate::image::processor::{DEFAULT_JPEG_QUALITY, ImageProcessor};

/// Pixels per PDF point when laying out scanned images. Pages are treated as
/// 128 DPI rasters, so a page-fitted image covers the full page width or
/// height.
pub const PX_PER_PT: f32 = 1.778;

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// ISO A4, 210 x 297 mm.
    pub const A4: Self = Self {
        width_pt: 595.28,
        height_pt: 841.89,
    };

    /// Largest image, in pixels, that fits on the page at [`PX_PER_PT`].
    pub fn bounds_px(&self) -> (u32, u32) {
        (
            (self.width_pt * PX_PER_PT) as u32,
            (self.height_pt * PX_PER_PT) as u32,
        )
    }
}

/// Creates single-page PDF documents from scanned images.
pub struct PdfWriter {
    /// Page size for the generated document.
    page: PageSize,
    /// Quality of the embedded JPEG.
    jpeg_quality: u8,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::a4()
    }
}

impl PdfWriter {
    /// Create a new writer targeting the given page size.
    pub fn new(page: PageSize) -> Self {
        Self {
            page,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Create a new writer for A4 pages.
    pub fn a4() -> Self {
        Self::new(PageSize::A4)
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Create a one-page PDF containing `image`.
    ///
    /// The image is first shrunk to fit the page (see
    /// [`ImageProcessor::fit_to_page`]), then drawn at its natural size from
    /// the top-left corner of the page.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn create_from_image(&self, image: ::image::DynamicImage) -> Result<Vec<u8>, ScanError> {
        let (bound_w, bound_h) = self.page.bounds_px();
        let fitted = ImageProcessor::from_dynamic(image).fit_to_page(bound_w, bound_h);
        let (img_w, img_h) = (fitted.width(), fitted.height());
        let jpeg = fitted.to_jpeg_bytes(self.jpeg_quality)?;

        info!(page = ?self.page, img_w, img_h, jpeg_bytes = jpeg.len(), "Creating image PDF");
        self.create_from_jpeg(jpeg, img_w, img_h)
    }

    /// Create a one-page PDF around an already-encoded RGB JPEG of
    /// `width` x `height` pixels.
    pub fn create_from_jpeg(
        &self,
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, ScanError> {
        let rendered_w = width as f32 / PX_PER_PT;
        let rendered_h = height as f32 / PX_PER_PT;
        // PDF space has its origin at the bottom-left; anchor the image to
        // the top of the page.
        let offset_y = self.page.height_pt - rendered_h;

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        rendered_w.into(),
                        0.into(),
                        0.into(),
                        rendered_h.into(),
                        0.into(),
                        offset_y.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|err| ScanError::PdfError(format!("content stream: {}", err)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.page.width_pt.into(),
                self.page.height_pt.into(),
            ],
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| ScanError::PdfError(format!("serialise: {}", err)))?;

        debug!(rendered_w, rendered_h, bytes = output.len(), "Image placed on page");
        Ok(output)
    }
}
