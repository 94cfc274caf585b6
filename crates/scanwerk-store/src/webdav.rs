// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// WebDAV document store.
//
// Documents live at `<root_url>/<upload_path>/<name>`. Existence is a HEAD
// (200 yes, 404 no), creation is a PUT that must answer 201 Created as RFC
// 4918 requires for a new resource. Every request carries basic credentials.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use scanwerk_core::config::WebDavConfig;
use scanwerk_core::error::{Result, ScanError};
use tracing::{info, instrument};

use crate::traits::DocumentStore;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for one WebDAV upload directory.
#[derive(Clone)]
pub struct WebDavClient {
    client: Client,
    root: Url,
    upload_path: String,
    user: String,
    password: String,
}

impl std::fmt::Debug for WebDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavClient")
            .field("root", &self.root.as_str())
            .field("upload_path", &self.upload_path)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl WebDavClient {
    pub fn new(config: &WebDavConfig) -> Result<Self> {
        let root = Url::parse(config.root_url.trim())
            .map_err(|e| ScanError::Config(format!("invalid webdav.root_url: {e}")))?;
        if root.cannot_be_a_base() {
            return Err(ScanError::Config(format!(
                "webdav.root_url cannot hold paths: {root}"
            )));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScanError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            root,
            upload_path: config.upload_path.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// Full URL of the document `name`. Path segments are percent-encoded.
    pub fn url_for(&self, name: &str) -> Result<Url> {
        let mut url = self.root.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ScanError::Store(format!("cannot extend {}", self.root)))?;
            segments
                .pop_if_empty()
                .extend(self.upload_path.split('/').filter(|s| !s.is_empty()))
                .push(name);
        }
        Ok(url)
    }

    async fn request(&self, method: Method, name: &str, body: Option<Vec<u8>>) -> Result<StatusCode> {
        let url = self.url_for(name)?;
        let mut request = self
            .client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password));
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?;
        Ok(response.status())
    }
}

impl DocumentStore for WebDavClient {
    #[instrument(skip(self))]
    async fn exists(&self, name: &str) -> Result<bool> {
        let status = self.request(Method::HEAD, name, None).await?;
        info!(status_code = status.as_u16(), "Checked file existence");

        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(ScanError::StoreStatus {
                status: other.as_u16(),
            }),
        }
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        info!(filename = name, "Uploading file to the WebDAV server");
        let status = self.request(Method::PUT, name, Some(bytes)).await?;
        info!(status_code = status.as_u16(), "Upload finished");

        if status != StatusCode::CREATED {
            return Err(ScanError::StoreStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
