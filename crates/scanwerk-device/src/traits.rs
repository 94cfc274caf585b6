// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend-agnostic trait definitions for scanner access.
//
// The option model follows SANE: a device exposes named options (mode,
// resolution, scan window corners) that are set before a read.

use image::DynamicImage;
use scanwerk_core::error::Result;

/// Well-known SANE option names.
pub mod option_names {
    pub const MODE: &str = "mode";
    pub const RESOLUTION: &str = "resolution";
    /// Top-left x of the scan window, in millimetres.
    pub const TL_X: &str = "tl-x";
    /// Top-left y of the scan window, in millimetres.
    pub const TL_Y: &str = "tl-y";
    /// Bottom-right x of the scan window, in millimetres.
    pub const BR_X: &str = "br-x";
    /// Bottom-right y of the scan window, in millimetres.
    pub const BR_Y: &str = "br-y";

    /// The four window options, in tl-x, tl-y, br-x, br-y order.
    pub const WINDOW: [&str; 4] = [TL_X, TL_Y, BR_X, BR_Y];
}

/// Value of a device option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Int(i64),
    /// Fixed-point value, e.g. a coordinate in millimetres.
    Fixed(f64),
    Text(String),
}

impl OptionValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Fixed(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Fixed(v) => write!(f, "{v:.3}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Factory for device connections.
pub trait ScannerBackend: Send + Sync {
    /// Short backend name for logs (e.g. "scanimage").
    fn name(&self) -> &str;

    /// Open a connection to the named device.
    ///
    /// Returns `ScanError::DeviceBusy` if another client holds the device and
    /// `ScanError::DeviceConnection` for any other failure.
    fn open(&self, device: &str) -> Result<Box<dyn DeviceHandle>>;
}

/// An open connection to one scanner.
pub trait DeviceHandle: Send {
    /// Set a device option. The value takes effect on the next read.
    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()>;

    /// Current value of a device option.
    fn get_option(&self, name: &str) -> Result<OptionValue>;

    /// Scan with the current options and return the raster.
    fn read_image(&mut self) -> Result<DynamicImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(OptionValue::Int(300).as_f64(), Some(300.0));
        assert_eq!(OptionValue::Fixed(215.9).as_f64(), Some(215.9));
        assert_eq!(OptionValue::Text(" 297.18 ".into()).as_f64(), Some(297.18));
        assert_eq!(OptionValue::Text("Color".into()).as_f64(), None);
    }

    #[test]
    fn display_uses_command_line_spelling() {
        assert_eq!(OptionValue::Int(75).to_string(), "75");
        assert_eq!(OptionValue::Fixed(33.866_666).to_string(), "33.867");
        assert_eq!(OptionValue::Text("Gray".into()).to_string(), "Gray");
    }
}
