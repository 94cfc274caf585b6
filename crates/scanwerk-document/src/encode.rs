// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output format registry.
//
// Each supported format is an `Encoder` entry pairing the tag a client asks
// for with the function that serialises a captured raster. The scan pipeline
// only ever talks to the registry, so adding a format means adding an entry
// here.

use ::image::DynamicImage;
use scanwerk_core::error::{Result, ScanError};
use tracing::debug;

use crate::image::processor::{DEFAULT_JPEG_QUALITY, ImageProcessor};
use crate::pdf::writer::PdfWriter;

/// Serialise a captured raster into document bytes.
pub type EncodeFn = fn(DynamicImage) -> Result<Vec<u8>>;

/// One output format.
#[derive(Clone, Copy)]
pub struct Encoder {
    /// Format tag as used in requests, e.g. `pdf`.
    pub tag: &'static str,
    /// Extension appended to stored file names.
    pub extension: &'static str,
    /// MIME type of the encoded bytes.
    pub mime_type: &'static str,
    encode: EncodeFn,
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("tag", &self.tag)
            .field("extension", &self.extension)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl Encoder {
    pub const fn new(
        tag: &'static str,
        extension: &'static str,
        mime_type: &'static str,
        encode: EncodeFn,
    ) -> Self {
        Self {
            tag,
            extension,
            mime_type,
            encode,
        }
    }

    /// Run the encoder over `image`.
    pub fn encode(&self, image: DynamicImage) -> Result<Vec<u8>> {
        (self.encode)(image)
    }

    /// `name` with this format's extension appended.
    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.extension)
    }
}

/// Direct JPEG output.
pub const JPEG: Encoder = Encoder::new("jpeg", "jpeg", "image/jpeg", encode_jpeg);

/// Page-fitted JPEG inside a one-page A4 PDF.
pub const PDF: Encoder = Encoder::new("pdf", "pdf", "application/pdf", encode_pdf);

/// Encode `image` as JPEG at the default quality.
pub fn encode_jpeg(image: DynamicImage) -> Result<Vec<u8>> {
    ImageProcessor::from_dynamic(image).to_jpeg_bytes(DEFAULT_JPEG_QUALITY)
}

fn encode_pdf(image: DynamicImage) -> Result<Vec<u8>> {
    PdfWriter::a4().create_from_image(image)
}

/// Lookup table from format tag to encoder.
#[derive(Debug, Clone)]
pub struct EncoderRegistry {
    encoders: Vec<Encoder>,
}

impl Default for EncoderRegistry {
    /// Registry with the built-in `jpeg` and `pdf` formats.
    fn default() -> Self {
        Self {
            encoders: vec![JPEG, PDF],
        }
    }
}

impl EncoderRegistry {
    /// Registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            encoders: Vec::new(),
        }
    }

    /// Add a format, replacing any existing entry with the same tag.
    pub fn register(&mut self, encoder: Encoder) {
        self.encoders.retain(|e| e.tag != encoder.tag);
        self.encoders.push(encoder);
    }

    /// Find the encoder for `tag`. Tags are matched exactly.
    pub fn resolve(&self, tag: &str) -> Result<&Encoder> {
        let found = self.encoders.iter().find(|e| e.tag == tag);
        debug!(tag, found = found.is_some(), "resolving output format");
        found.ok_or_else(|| ScanError::UnsupportedFormat(tag.to_string()))
    }

    /// Tags of every registered format.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.encoders.iter().map(|e| e.tag)
    }
}
