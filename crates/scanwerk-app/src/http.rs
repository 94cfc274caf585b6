// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface: preview, scan, and the static front end.
//
// Errors are answered with short plain-text messages the front end shows
// as-is. Anything that is not the client's fault becomes a generic 500 and
// the detail goes to the log only.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use scanwerk_core::error::{ErrorClass, ScanError};
use scanwerk_core::options::ScanOptions;
use scanwerk_document::encode::{JPEG, encode_jpeg};
use scanwerk_store::DocumentStore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::services::blocking;
use crate::services::pipeline::AcquisitionPipeline;

const INTERNAL_ERROR_MSG: &str = "Something happened";

/// Build the application router.
pub fn router<S>(pipeline: Arc<AcquisitionPipeline<S>>, public_dir: &Path) -> Router
where
    S: DocumentStore + 'static,
{
    let routes = Router::new()
        .route("/preview.jpg", get(preview::<S>))
        .route("/scan", get(scan::<S>));
    let routes = uncached(routes)
        .fallback_service(ServeDir::new(public_dir))
        .with_state(pipeline);

    with_middleware(routes)
}

/// Mark every route added so far as uncacheable. Both endpoints look
/// cacheable to browsers and must never be cached.
///
/// Panics are caught inside the header layer, so the 500 a panicking handler
/// turns into still carries `no-cache`.
fn uncached<T>(routes: Router<T>) -> Router<T>
where
    T: Clone + Send + Sync + 'static,
{
    routes
        .route_layer(CatchPanicLayer::custom(panic_response))
        .route_layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
}

/// Request tracing, plus panic recovery for the static file fallback.
fn with_middleware(routes: Router) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let reason = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(err = reason, "Recovering from panic");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MSG).into_response()
}

async fn preview<S>(State(pipeline): State<Arc<AcquisitionPipeline<S>>>) -> Result<Response, ApiError>
where
    S: DocumentStore + 'static,
{
    let image = pipeline.preview().await.inspect_err(|e| {
        error!(error = %e, "Failed to get preview from scanner");
    })?;
    let jpeg = blocking(move || encode_jpeg(image)).await?;

    Ok(([(header::CONTENT_TYPE, JPEG.mime_type)], jpeg).into_response())
}

async fn scan<S>(
    State(pipeline): State<Arc<AcquisitionPipeline<S>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<String, ApiError>
where
    S: DocumentStore + 'static,
{
    let options = ScanOptions::from_query(&query)?;
    let name = pipeline.scan_and_store(&options).await.inspect_err(|e| {
        error!(error = %e, "Failed to scan or to upload to the document store");
    })?;
    Ok(name)
}

/// A [`ScanError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(ScanError);

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match (&self.0, self.0.class()) {
            (ScanError::MissingFormat, _) => (StatusCode::BAD_REQUEST, "Missing format"),
            (ScanError::MalformedRect(_), _) => {
                (StatusCode::BAD_REQUEST, "Missing or malformed rect arguments")
            }
            (ScanError::UnsupportedFormat(_), _) => (StatusCode::BAD_REQUEST, "Unsupported format"),
            (_, ErrorClass::Conflict) => (StatusCode::CONFLICT, "File name already in use"),
            (_, ErrorClass::Busy) => (StatusCode::SERVICE_UNAVAILABLE, "Device busy"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MSG),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_client_error() {
            warn!(error = %self.0, status = status.as_u16(), "Rejected request");
        }
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use scanwerk_core::types::ColorMode;
    use scanwerk_device::{DeviceSession, SessionSettings, VirtualScanner};
    use scanwerk_document::EncoderRegistry;
    use tower::ServiceExt;

    use crate::services::test_support::MemoryStore;

    struct Harness {
        scanner: VirtualScanner,
        store: MemoryStore,
        app: Router,
        _public: tempfile::TempDir,
    }

    fn harness(store: MemoryStore) -> Harness {
        let scanner = VirtualScanner::new();
        let session = DeviceSession::new(
            Box::new(scanner.clone()),
            SessionSettings {
                device_name: "virtual:0".into(),
                mode: ColorMode::Color,
                preview_res: 75,
            },
        );
        let pipeline = Arc::new(AcquisitionPipeline::new(
            Arc::new(session),
            store.clone(),
            EncoderRegistry::default(),
            150,
        ));

        let public = tempfile::tempdir().expect("tempdir");
        std::fs::write(public.path().join("index.html"), "<h1>scan</h1>").expect("write");

        Harness {
            app: router(pipeline, public.path()),
            scanner,
            store,
            _public: public,
        }
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let cache = response
            .headers()
            .get(header::CACHE_CONTROL)
            .map(|v| v.to_str().expect("ascii").to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, cache, body.to_vec())
    }

    #[tokio::test]
    async fn preview_is_an_uncached_jpeg() {
        let h = harness(MemoryStore::default());
        let (status, cache, body) = get(&h.app, "/preview.jpg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("no-cache"));
        assert_eq!(&body[..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(h.scanner.stats().last_resolution, Some(75));
    }

    #[tokio::test]
    async fn scan_returns_file_name() {
        let h = harness(MemoryStore::default());
        let (status, cache, body) =
            get(&h.app, "/scan?format=pdf&name=letter&x=0&y=0&width=100&height=200").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("no-cache"));
        assert_eq!(body, b"letter.pdf");
        assert_eq!(h.store.names(), vec!["letter.pdf"]);
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let h = harness(MemoryStore::default());
        let cases = [
            ("/scan", "Missing format"),
            ("/scan?format=pdf&x=1", "Missing or malformed rect arguments"),
            (
                "/scan?format=pdf&x=1&y=1&width=-5&height=3",
                "Missing or malformed rect arguments",
            ),
            ("/scan?format=png", "Unsupported format"),
        ];
        for (uri, message) in cases {
            let (status, cache, body) = get(&h.app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(cache.as_deref(), Some("no-cache"), "{uri}");
            assert_eq!(body, message.as_bytes(), "{uri}");
        }
        assert_eq!(h.scanner.stats().opens, 0);
    }

    #[tokio::test]
    async fn taken_name_is_a_conflict() {
        let h = harness(MemoryStore::with_file("letter.jpeg"));
        let (status, _, body) = get(&h.app, "/scan?format=jpeg&name=letter").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, b"File name already in use");
    }

    #[tokio::test]
    async fn busy_scanner_is_unavailable() {
        let h = harness(MemoryStore::default());
        h.scanner.set_busy(true);
        let (status, _, body) = get(&h.app, "/preview.jpg").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, b"Device busy");
    }

    #[tokio::test]
    async fn other_failures_are_generic() {
        let store = MemoryStore::default();
        *store.fail_status.lock().unwrap() = Some(500);
        let h = harness(store);
        let (status, _, body) = get(&h.app, "/scan?format=jpeg").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, INTERNAL_ERROR_MSG.as_bytes());
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let h = harness(MemoryStore::default());
        let (status, cache, body) = get(&h.app, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache, None);
        assert_eq!(body, b"<h1>scan</h1>");
    }

    #[tokio::test]
    async fn bundled_front_end_sends_rectangles_in_preview_pixels() {
        let public = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../public");
        let pipeline = Arc::new(AcquisitionPipeline::new(
            Arc::new(DeviceSession::new(
                Box::new(VirtualScanner::new()),
                SessionSettings {
                    device_name: "virtual:0".into(),
                    mode: ColorMode::Color,
                    preview_res: 75,
                },
            )),
            MemoryStore::default(),
            EncoderRegistry::default(),
            150,
        ));
        let app = router(pipeline, &public);

        let (status, _, page) = get(&app, "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        let page = String::from_utf8(page).expect("utf-8");
        assert!(page.contains("./js/selection.js"));
        assert!(page.contains("selection.area()"));

        let (status, _, script) = get(&app, "/js/selection.js").await;
        assert_eq!(status, StatusCode::OK);
        let script = String::from_utf8(script).expect("utf-8");
        // Displayed pixels are scaled to the raster the preview was taken at.
        assert!(script.contains("naturalWidth / this.img.clientWidth"));
        assert!(script.contains("naturalHeight / this.img.clientHeight"));
        assert!(script.contains("Math.trunc"));
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        async fn boom() -> &'static str {
            panic!("scanner exploded")
        }

        let app = with_middleware(Router::new().route("/boom", axum::routing::get(boom)));
        let (status, _, body) = get(&app, "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, INTERNAL_ERROR_MSG.as_bytes());
    }

    #[tokio::test]
    async fn panicking_route_stays_uncached() {
        async fn boom() -> &'static str {
            panic!("scanner exploded")
        }

        let routes = uncached(Router::new().route("/boom", axum::routing::get(boom)));
        let app = with_middleware(routes);
        let (status, cache, body) = get(&app, "/boom").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(cache.as_deref(), Some("no-cache"));
        assert_eq!(body, INTERNAL_ERROR_MSG.as_bytes());
    }

    #[tokio::test]
    async fn preview_content_type_comes_from_the_jpeg_encoder() {
        let h = harness(MemoryStore::default());
        let response = h
            .app
            .clone()
            .oneshot(Request::get("/preview.jpg").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(HeaderValue::as_bytes),
            Some(JPEG.mime_type.as_bytes())
        );
    }

    #[tokio::test]
    async fn rectangle_outside_the_bed_is_a_bad_request() {
        let h = harness(MemoryStore::default());
        let (status, _, body) = get(&h.app, "/scan?format=jpeg&x=1000&y=0&width=50&height=50").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, b"Missing or malformed rect arguments");
        assert_eq!(h.scanner.stats().reads, 0);
        assert!(h.store.names().is_empty());
    }
}
