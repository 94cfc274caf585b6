// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Scanwerk: scanner device access.
//!
//! The [`DeviceSession`] owns the single connection to the flatbed and is the
//! only way the rest of the server reaches it. The session talks to hardware
//! through the [`traits::ScannerBackend`] seam so the SANE front end can be
//! swapped for the in-process virtual flatbed in tests and demos.

pub mod scanimage;
pub mod session;
pub mod traits;
pub mod virtual_scanner;

use scanwerk_core::config::{BackendKind, ScannerConfig};
use scanwerk_core::error::Result;

pub use session::{DeviceSession, SessionSettings};
pub use traits::{DeviceHandle, OptionValue, ScannerBackend};
pub use virtual_scanner::VirtualScanner;

/// Build the backend selected in the configuration.
///
/// For the `scanimage` backend this checks that the binary can be run, which
/// is the one device failure that stops the server from starting.
pub fn backend_from_config(config: &ScannerConfig) -> Result<Box<dyn ScannerBackend>> {
    match config.backend {
        BackendKind::Scanimage => Ok(Box::new(scanimage::ScanimageBackend::init(
            &config.scanimage_path,
        )?)),
        BackendKind::Virtual => {
            tracing::warn!("using virtual scanner backend, no hardware will be touched");
            Ok(Box::new(VirtualScanner::new()))
        }
    }
}
