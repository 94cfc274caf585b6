// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: bridges the HTTP handlers to the scanwerk backend crates.

pub mod pipeline;

use scanwerk_core::error::{Result, ScanError};

/// Run blocking device or encoding work on Tokio's blocking pool.
///
/// A panic inside `work` is re-raised on the calling task so the HTTP panic
/// layer reports it like any other handler panic.
pub async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(ScanError::DeviceIo(format!("blocking task cancelled: {err}"))),
    }
}
