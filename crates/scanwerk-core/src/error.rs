// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Request validation --
    #[error("missing format")]
    MissingFormat,

    #[error("malformed rect: {0}")]
    MalformedRect(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file name already in use: {0}")]
    NameConflict(String),

    // -- Device errors --
    #[error("failed to connect to device '{device}': {reason}")]
    DeviceConnection { device: String, reason: String },

    #[error("device busy")]
    DeviceBusy,

    #[error("device I/O failed: {0}")]
    DeviceIo(String),

    #[error("scanner backend unavailable: {0}")]
    BackendUnavailable(String),

    // -- Encoding --
    #[error("image encoding failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Document store --
    #[error("document store request failed: {0}")]
    Store(String),

    #[error("document store responded with unexpected status {status}")]
    StoreStatus { status: u16 },

    // -- Startup --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad classification used by the HTTP layer to choose a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad request input, detected before any device or network I/O.
    Validation,
    /// The requested output name is already taken in the store.
    Conflict,
    /// The scanner is in use by someone else.
    Busy,
    /// Connection or read failure on the scanner.
    Device,
    /// Network or protocol failure talking to the document store.
    Store,
    /// Everything else (encoding, configuration, local I/O).
    Internal,
}

impl ScanError {
    /// Classify this error for response mapping and logging.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingFormat | Self::MalformedRect(_) | Self::UnsupportedFormat(_) => {
                ErrorClass::Validation
            }
            Self::NameConflict(_) => ErrorClass::Conflict,
            Self::DeviceBusy => ErrorClass::Busy,
            Self::DeviceConnection { .. } | Self::DeviceIo(_) => ErrorClass::Device,
            Self::Store(_) | Self::StoreStatus { .. } => ErrorClass::Store,
            Self::BackendUnavailable(_)
            | Self::ImageError(_)
            | Self::PdfError(_)
            | Self::Config(_)
            | Self::Io(_) => ErrorClass::Internal,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
