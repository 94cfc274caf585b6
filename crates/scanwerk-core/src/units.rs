// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel to millimetre conversion.

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// Convert a pixel offset measured on a raster scanned at `dpi` into
/// millimetres on the scanner bed.
///
/// `dpi` must be positive; configuration validation guarantees this for the
/// resolutions the server uses.
pub fn pixels_to_mm(value: u32, dpi: u32) -> f64 {
    f64::from(value) * MM_PER_INCH / f64::from(dpi)
}

/// Inverse of [`pixels_to_mm`], rounded to the nearest whole pixel.
pub fn mm_to_pixels(value: f64, dpi: u32) -> u32 {
    (value * f64::from(dpi) / MM_PER_INCH).round().max(0.0) as u32
}
