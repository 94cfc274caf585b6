// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan request options, parsed from the query string of a scan request.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, ScanError};
use crate::types::PixelArea;

/// Parameters for one scan-and-store request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Output format tag, e.g. `jpeg` or `pdf`. Checked against the encoder
    /// registry before the device is touched.
    pub format: String,
    /// User-chosen file name without extension. `None` means a timestamp
    /// name is generated.
    pub file_name: Option<String>,
    /// Area to scan in preview pixels. `None` scans the whole bed.
    pub area: Option<PixelArea>,
}

impl ScanOptions {
    /// Full-bed scan in the given format with a generated name.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            file_name: None,
            area: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_area(mut self, area: PixelArea) -> Self {
        self.area = Some(area);
        self
    }

    /// Build options from `format`, `name`, `x`, `y`, `width` and `height`
    /// query parameters.
    ///
    /// Empty values count as absent. The rectangle is all-or-nothing: if any
    /// of its four parameters is present, all four must be present and parse
    /// as non-negative integers.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| query.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let format = get("format").ok_or(ScanError::MissingFormat)?;

        let mut options = Self::new(format);
        options.file_name = get("name").map(str::to_string);

        let rect = [get("x"), get("y"), get("width"), get("height")];
        if rect.iter().all(Option::is_none) {
            return Ok(options);
        }

        let [Some(x), Some(y), Some(width), Some(height)] = rect else {
            return Err(ScanError::MalformedRect(
                "x, y, width and height must be given together".into(),
            ));
        };

        let area = PixelArea::from_origin_and_size(
            parse_coordinate("x", x)?,
            parse_coordinate("y", y)?,
            parse_coordinate("width", width)?,
            parse_coordinate("height", height)?,
        )
        .ok_or_else(|| ScanError::MalformedRect("rectangle out of range".into()))?;

        options.area = Some(area);
        Ok(options)
    }
}

fn parse_coordinate(name: &str, raw: &str) -> Result<u32> {
    raw.trim().parse::<u32>().map_err(|err| {
        debug!(name, raw, error = %err, "failed to parse rectangle value");
        ScanError::MalformedRect(format!("invalid {name} value '{raw}'"))
    })
}
