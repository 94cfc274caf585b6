// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Acquisition pipeline: preview capture and scan-to-store.
//
// A scan request runs: resolve encoder, name conflict check, capture, encode,
// store. The first two steps never touch the device, so a bad format or a
// taken name fails without moving the scanner head. The device lock is held
// only for the capture itself; encoding and upload run after it is released.

use std::sync::Arc;

use chrono::Local;
use image::DynamicImage;
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::options::ScanOptions;
use scanwerk_core::types::PixelArea;
use scanwerk_device::DeviceSession;
use scanwerk_document::EncoderRegistry;
use scanwerk_store::DocumentStore;
use tracing::{info, instrument};

use super::blocking;

/// Layout of generated file names, e.g. `2026-10-19_09-30-00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Orchestrates device, encoders and document store for one server.
pub struct AcquisitionPipeline<S> {
    session: Arc<DeviceSession>,
    store: S,
    encoders: EncoderRegistry,
    scan_res: u32,
}

impl<S: DocumentStore> AcquisitionPipeline<S> {
    pub fn new(
        session: Arc<DeviceSession>,
        store: S,
        encoders: EncoderRegistry,
        scan_res: u32,
    ) -> Self {
        Self {
            session,
            store,
            encoders,
            scan_res,
        }
    }

    pub fn session(&self) -> &Arc<DeviceSession> {
        &self.session
    }

    /// Capture the full bed at the preview resolution.
    pub async fn preview(&self) -> Result<DynamicImage> {
        let resolution = self.session.settings().preview_res;
        self.capture(resolution, None).await
    }

    /// Scan, encode and upload according to `options`, returning the stored
    /// file name.
    #[instrument(skip(self, options), fields(format = %options.format))]
    pub async fn scan_and_store(&self, options: &ScanOptions) -> Result<String> {
        let encoder = *self.encoders.resolve(&options.format)?;

        let file_name = match &options.file_name {
            Some(name) => {
                let file_name = encoder.file_name(name);
                if self.store.exists(&file_name).await? {
                    info!(filename = %file_name, "File name already in use");
                    return Err(ScanError::NameConflict(file_name));
                }
                file_name
            }
            None => encoder.file_name(&Local::now().format(TIMESTAMP_FORMAT).to_string()),
        };

        let image = self.capture(self.scan_res, options.area).await?;
        let bytes = blocking(move || encoder.encode(image)).await?;
        info!(filename = %file_name, size = bytes.len(), "Encoded scan");

        self.store.store(&file_name, bytes).await?;
        Ok(file_name)
    }

    async fn capture(&self, resolution: u32, area: Option<PixelArea>) -> Result<DynamicImage> {
        let session = Arc::clone(&self.session);
        blocking(move || session.capture(resolution, area.as_ref())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::MemoryStore;
    use scanwerk_core::types::ColorMode;
    use scanwerk_device::{SessionSettings, VirtualScanner};

    fn pipeline(scanner: &VirtualScanner, store: MemoryStore) -> AcquisitionPipeline<MemoryStore> {
        let session = DeviceSession::new(
            Box::new(scanner.clone()),
            SessionSettings {
                device_name: "virtual:0".into(),
                mode: ColorMode::Color,
                preview_res: 75,
            },
        );
        AcquisitionPipeline::new(Arc::new(session), store, EncoderRegistry::default(), 150)
    }

    fn is_timestamp_name(name: &str, extension: &str) -> bool {
        name.strip_suffix(&format!(".{extension}"))
            .is_some_and(|stem| chrono::NaiveDateTime::parse_from_str(stem, TIMESTAMP_FORMAT).is_ok())
    }

    #[tokio::test]
    async fn preview_uses_preview_resolution_and_full_bed() {
        let scanner = VirtualScanner::new();
        let pipeline = pipeline(&scanner, MemoryStore::default());

        pipeline.preview().await.expect("preview");
        let stats = scanner.stats();
        assert_eq!(stats.last_resolution, Some(75));
        assert_eq!(stats.last_window, Some(scanner.bed()));
    }

    #[tokio::test]
    async fn unsupported_format_never_touches_device() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::default();
        let pipeline = pipeline(&scanner, store.clone());

        let err = pipeline
            .scan_and_store(&ScanOptions::new("tiff"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFormat(_)));
        assert_eq!(scanner.stats().opens, 0);
        assert_eq!(scanner.stats().reads, 0);
        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn taken_name_is_a_conflict_before_capture() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::with_file("invoice.pdf");
        let pipeline = pipeline(&scanner, store.clone());

        let options = ScanOptions::new("pdf").with_file_name("invoice");
        let err = pipeline.scan_and_store(&options).await.unwrap_err();
        assert!(matches!(err, ScanError::NameConflict(ref n) if n == "invoice.pdf"));
        assert_eq!(scanner.stats().reads, 0);
    }

    #[tokio::test]
    async fn same_stem_with_other_format_is_free() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::with_file("invoice.pdf");
        let pipeline = pipeline(&scanner, store.clone());

        let options = ScanOptions::new("jpeg").with_file_name("invoice");
        let name = pipeline.scan_and_store(&options).await.expect("scan");
        assert_eq!(name, "invoice.jpeg");
        assert_eq!(store.names(), vec!["invoice.jpeg", "invoice.pdf"]);
    }

    #[tokio::test]
    async fn jpeg_scan_restores_default_area_and_uses_timestamp() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::default();
        let pipeline = pipeline(&scanner, store.clone());

        // Leave a partial window programmed on the device first.
        let partial = ScanOptions::new("jpeg")
            .with_area(PixelArea::from_origin_and_size(5, 5, 20, 20).expect("area"));
        pipeline.scan_and_store(&partial).await.expect("partial scan");

        let name = pipeline
            .scan_and_store(&ScanOptions::new("jpeg"))
            .await
            .expect("scan");

        assert!(is_timestamp_name(&name, "jpeg"), "{name}");
        let stats = scanner.stats();
        assert_eq!(stats.last_window, Some(scanner.bed()));
        assert_eq!(stats.last_resolution, Some(150));

        let files = store.files.lock().unwrap();
        let bytes = files.get(&name).expect("stored");
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn pdf_scan_of_rectangle_programs_preview_millimetres() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::default();
        let pipeline = pipeline(&scanner, store.clone());

        let options = ScanOptions::new("pdf")
            .with_file_name("receipt")
            .with_area(PixelArea::from_origin_and_size(0, 0, 100, 200).expect("area"));
        let name = pipeline.scan_and_store(&options).await.expect("scan");
        assert_eq!(name, "receipt.pdf");

        let window = scanner.stats().last_window.expect("window");
        assert_eq!((window.tl_x, window.tl_y), (0.0, 0.0));
        assert!((window.br_x - 33.87).abs() < 0.01);
        assert!((window.br_y - 67.73).abs() < 0.01);

        let files = store.files.lock().unwrap();
        let doc = lopdf::Document::load_mem(files.get("receipt.pdf").expect("stored"))
            .expect("valid pdf");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn connect_failure_then_recovery() {
        let scanner = VirtualScanner::new();
        scanner.fail_next_connects(1);
        let store = MemoryStore::default();
        let pipeline = pipeline(&scanner, store.clone());

        let err = pipeline
            .scan_and_store(&ScanOptions::new("jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::DeviceConnection { .. }));
        assert!(store.names().is_empty());

        pipeline
            .scan_and_store(&ScanOptions::new("jpeg"))
            .await
            .expect("second request");
        assert_eq!(store.names().len(), 1);
        assert_eq!(pipeline.session().default_area(), Some(scanner.bed()));
    }

    #[tokio::test]
    async fn busy_device_stores_nothing() {
        let scanner = VirtualScanner::new();
        scanner.set_busy(true);
        let store = MemoryStore::default();
        let pipeline = pipeline(&scanner, store.clone());

        let err = pipeline
            .scan_and_store(&ScanOptions::new("pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::DeviceBusy));
        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let scanner = VirtualScanner::new();
        let store = MemoryStore::default();
        *store.fail_status.lock().unwrap() = Some(507);
        let pipeline = pipeline(&scanner, store.clone());

        let err = pipeline
            .scan_and_store(&ScanOptions::new("jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::StoreStatus { status: 507 }));
    }
}
