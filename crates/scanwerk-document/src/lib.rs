// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: Turning captured rasters into stored documents.
//
// Provides page fitting (aspect-preserving Lanczos3 downscale to the page
// size), JPEG encoding, single-page PDF creation, and the format registry the
// scan pipeline dispatches through.

pub mod encode;
pub mod image;
pub mod pdf;

// Re-export the primary items so callers can use `scanwerk_document::EncoderRegistry` etc.
pub use encode::{Encoder, EncoderRegistry};
pub use crate::image::processor::ImageProcessor;
pub use pdf::writer::PdfWriter;
