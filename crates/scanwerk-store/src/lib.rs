// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Scanwerk: where finished documents go.
//!
//! [`DocumentStore`] is the contract the scan pipeline uploads through;
//! [`WebDavClient`] implements it against any WebDAV server.

pub mod traits;
pub mod webdav;

pub use traits::DocumentStore;
pub use webdav::WebDavClient;
