// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration, loaded from a YAML file at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ScanError};
use crate::types::ColorMode;

/// Top-level structure of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub http: HttpConfig,
    pub webdav: WebDavConfig,
}

/// Which implementation drives the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SANE through the `scanimage` command-line front end.
    #[default]
    Scanimage,
    /// In-process emulated flatbed, for demos and tests.
    Virtual,
}

/// Settings for the scanning device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub backend: BackendKind,
    /// SANE device name, e.g. `genesys:libusb:001:004`.
    pub device_name: String,
    /// Colour mode set when the connection is opened.
    pub mode: ColorMode,
    /// Resolution of previews, in DPI. Rectangles drawn on a preview are
    /// converted to millimetres with this value.
    pub preview_res: u32,
    /// Resolution of full scans, in DPI.
    pub scan_res: u32,
    /// Path to the `scanimage` binary for the `scanimage` backend.
    pub scanimage_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Scanimage,
            device_name: String::new(),
            mode: ColorMode::Color,
            preview_res: 75,
            scan_res: 300,
            scanimage_path: PathBuf::from("scanimage"),
        }
    }
}

/// Settings for the HTTP server serving previews, scans and the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "bind_addr")]
    pub address: String,
    #[serde(rename = "bind_port")]
    pub port: u16,
    /// Directory of static front-end files.
    pub public_dir: PathBuf,
    /// PEM certificate chain. Together with `tls_key` switches the server to
    /// HTTPS.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key for `tls_cert`.
    pub tls_key: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 8080,
            public_dir: PathBuf::from("./public"),
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl HttpConfig {
    /// `address:port` string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Certificate and key paths when HTTPS is configured.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    pub fn use_tls(&self) -> bool {
        self.tls_files().is_some()
    }
}

/// Settings for the WebDAV server scanned documents are uploaded to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDavConfig {
    pub root_url: String,
    pub user: String,
    pub password: String,
    /// Directory under `root_url` that uploads land in.
    pub upload_path: String,
}

impl AppConfig {
    /// Parse and validate the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.as_ref().display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string. Missing sections
    /// and keys take their defaults.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| ScanError::Config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scan pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.preview_res == 0 || self.scanner.scan_res == 0 {
            return Err(ScanError::Config(
                "scanner.preview_res and scanner.scan_res must be positive".into(),
            ));
        }
        if self.scanner.backend == BackendKind::Scanimage
            && self.scanner.device_name.trim().is_empty()
        {
            return Err(ScanError::Config(
                "scanner.device_name is required for the scanimage backend".into(),
            ));
        }
        if self.http.tls_cert.is_some() != self.http.tls_key.is_some() {
            return Err(ScanError::Config(
                "http.tls_cert and http.tls_key must be set together".into(),
            ));
        }
        if self.webdav.root_url.trim().is_empty() {
            return Err(ScanError::Config("webdav.root_url is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
scanner:
  device_name: "genesys:libusb:001:004"
  mode: Gray
  preview_res: 50
  scan_res: 600
http:
  bind_addr: 0.0.0.0
webdav:
  root_url: https://dav.example.org/remote.php/webdav
  user: scanner
  password: hunter2
  upload_path: Scans
"#;

    #[test]
    fn parses_full_file() {
        let config = AppConfig::from_yaml(SAMPLE).expect("parse");
        assert_eq!(config.scanner.device_name, "genesys:libusb:001:004");
        assert_eq!(config.scanner.mode, ColorMode::Gray);
        assert_eq!(config.scanner.preview_res, 50);
        assert_eq!(config.scanner.scan_res, 600);
        assert_eq!(config.webdav.upload_path, "Scans");
        assert_eq!(config.http.address, "0.0.0.0");
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = AppConfig::from_yaml(SAMPLE).expect("parse");
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.scanner.backend, BackendKind::Scanimage);
        assert_eq!(config.scanner.scanimage_path, PathBuf::from("scanimage"));
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let raw = SAMPLE.replace("preview_res: 50", "preview_res: 0");
        let err = AppConfig::from_yaml(&raw).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
    }

    #[test]
    fn virtual_backend_needs_no_device_name() {
        let raw = r#"
scanner:
  backend: virtual
webdav:
  root_url: http://localhost:9000/dav
"#;
        let config = AppConfig::from_yaml(raw).expect("parse");
        assert_eq!(config.scanner.backend, BackendKind::Virtual);
        assert!(config.scanner.device_name.is_empty());
    }

    #[test]
    fn scanimage_backend_requires_device_name() {
        let raw = "webdav:\n  root_url: http://localhost/dav\n";
        assert!(matches!(
            AppConfig::from_yaml(raw).unwrap_err(),
            ScanError::Config(_)
        ));
    }

    #[test]
    fn plain_http_by_default() {
        let config = AppConfig::from_yaml(SAMPLE).expect("parse");
        assert!(!config.http.use_tls());
        assert_eq!(config.http.tls_files(), None);
    }

    #[test]
    fn cert_and_key_enable_tls() {
        let raw = SAMPLE.replace(
            "  bind_addr: 0.0.0.0\n",
            "  bind_addr: 0.0.0.0\n  tls_cert: /etc/scanwerk/cert.pem\n  tls_key: /etc/scanwerk/key.pem\n",
        );
        let config = AppConfig::from_yaml(&raw).expect("parse");
        assert!(config.http.use_tls());
        assert_eq!(
            config.http.tls_files(),
            Some((
                Path::new("/etc/scanwerk/cert.pem"),
                Path::new("/etc/scanwerk/key.pem")
            ))
        );
    }

    #[test]
    fn cert_without_key_is_rejected() {
        let raw = SAMPLE.replace(
            "  bind_addr: 0.0.0.0\n",
            "  bind_addr: 0.0.0.0\n  tls_cert: /etc/scanwerk/cert.pem\n",
        );
        let err = AppConfig::from_yaml(&raw).unwrap_err();
        assert!(matches!(err, ScanError::Config(ref m) if m.contains("tls_key")), "{err:?}");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let config = AppConfig::load(file.path()).expect("load");
        assert_eq!(config.webdav.user, "scanner");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = AppConfig::load("/nonexistent/scanwerk.yaml").unwrap_err();
        assert!(matches!(err, ScanError::Io(_)));
    }
}
