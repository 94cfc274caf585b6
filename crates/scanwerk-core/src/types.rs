// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan server.

use serde::{Deserialize, Serialize};

use crate::units::pixels_to_mm;

/// A rectangle on the scanner bed, described by its top-left and
/// bottom-right corners.
///
/// The unit is carried by the type parameter: [`PixelArea`] for rectangles
/// drawn on a preview raster, [`PhysicalArea`] for the millimetre window the
/// device is programmed with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanArea<U> {
    pub tl_x: U,
    pub tl_y: U,
    pub br_x: U,
    pub br_y: U,
}

/// Rectangle in preview pixels.
pub type PixelArea = ScanArea<u32>;

/// Rectangle in millimetres.
pub type PhysicalArea = ScanArea<f64>;

impl ScanArea<u32> {
    /// Build a pixel rectangle from an origin and a size, as sent by the
    /// front end after the user drags over the preview.
    ///
    /// Returns `None` if the far corner overflows `u32`.
    pub fn from_origin_and_size(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        Some(Self {
            tl_x: x,
            tl_y: y,
            br_x: x.checked_add(width)?,
            br_y: y.checked_add(height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.br_x.saturating_sub(self.tl_x)
    }

    pub fn height(&self) -> u32 {
        self.br_y.saturating_sub(self.tl_y)
    }

    /// Convert every corner to millimetres. `dpi` is the resolution of the
    /// raster the pixel coordinates were measured on, i.e. the preview
    /// resolution.
    pub fn to_physical(&self, dpi: u32) -> PhysicalArea {
        ScanArea {
            tl_x: pixels_to_mm(self.tl_x, dpi),
            tl_y: pixels_to_mm(self.tl_y, dpi),
            br_x: pixels_to_mm(self.br_x, dpi),
            br_y: pixels_to_mm(self.br_y, dpi),
        }
    }
}

impl ScanArea<f64> {
    pub fn width_mm(&self) -> f64 {
        self.br_x - self.tl_x
    }

    pub fn height_mm(&self) -> f64 {
        self.br_y - self.tl_y
    }

    /// The part of `self` that lies within `bounds`, or `None` when they do
    /// not overlap.
    pub fn clamp_to(&self, bounds: &PhysicalArea) -> Option<PhysicalArea> {
        let clamped = ScanArea {
            tl_x: self.tl_x.max(bounds.tl_x),
            tl_y: self.tl_y.max(bounds.tl_y),
            br_x: self.br_x.min(bounds.br_x),
            br_y: self.br_y.min(bounds.br_y),
        };
        (clamped.width_mm() > 0.0 && clamped.height_mm() > 0.0).then_some(clamped)
    }
}

/// Colour mode requested from the scanner when the connection is opened.
///
/// Serialised with the SANE option spelling (`Color`, `Gray`, `Lineart`).
/// Anything else is passed through verbatim so devices with vendor-specific
/// mode names still work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorMode {
    Color,
    Gray,
    Lineart,
    Other(String),
}

impl ColorMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Color => "Color",
            Self::Gray => "Gray",
            Self::Lineart => "Lineart",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ColorMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Color" | "color" => Self::Color,
            "Gray" | "gray" | "Grey" | "grey" => Self::Gray,
            "Lineart" | "lineart" => Self::Lineart,
            _ => Self::Other(value),
        }
    }
}

impl From<ColorMode> for String {
    fn from(value: ColorMode) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
