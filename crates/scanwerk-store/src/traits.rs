// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contract for remote document storage.

use std::future::Future;

use scanwerk_core::error::Result;

/// Remote storage for finished documents, addressed by file name.
pub trait DocumentStore: Send + Sync {
    /// Whether a document called `name` already exists.
    ///
    /// Anything other than a definite yes or no is an error, so a flaky
    /// server is never mistaken for a free name.
    fn exists(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Create the document `name` with `bytes` as its content.
    fn store(&self, name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}
