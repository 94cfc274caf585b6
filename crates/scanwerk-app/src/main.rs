// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: flatbed scanner over HTTP
//
// Entry point. Initialises logging, loads the configuration, opens the scanner
// session and serves the HTTP routes, over TLS when a certificate and key are
// configured, until Ctrl+C or SIGTERM.

mod http;
mod services;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use scanwerk_core::AppConfig;
use scanwerk_device::{DeviceSession, SessionSettings};
use scanwerk_document::EncoderRegistry;
use scanwerk_store::WebDavClient;
use tracing::{error, info, warn};

use services::blocking;
use services::pipeline::AcquisitionPipeline;

/// Scan documents from a flatbed scanner and upload them to WebDAV.
#[derive(Debug, Parser)]
#[command(name = "scanwerk", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "SCANWERK_CONFIG", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Scanwerk starting");

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let backend = scanwerk_device::backend_from_config(&config.scanner)
        .context("failed to initialise the scanning backend")?;
    let session = Arc::new(DeviceSession::new(
        backend,
        SessionSettings {
            device_name: config.scanner.device_name.clone(),
            mode: config.scanner.mode.clone(),
            preview_res: config.scanner.preview_res,
        },
    ));

    // A scanner that is off at boot is not fatal; the first request retries.
    let startup = Arc::clone(&session);
    if let Err(e) = blocking(move || startup.connect()).await {
        warn!(error = %e, "Scanner not available at startup, will retry on first request");
    }

    let store = WebDavClient::new(&config.webdav).context("invalid WebDAV configuration")?;
    let pipeline = Arc::new(AcquisitionPipeline::new(
        session,
        store,
        EncoderRegistry::default(),
        config.scanner.scan_res,
    ));
    let app = http::router(Arc::clone(&pipeline), &config.http.public_dir);

    let addr = config.http.bind_addr();
    match config.http.tls_files() {
        Some((cert, key)) => serve_tls(app, &addr, cert, key).await?,
        None => serve_plain(app, &addr).await?,
    }

    let closing = Arc::clone(pipeline.session());
    if let Err(e) = blocking(move || closing.close()).await {
        error!(error = %e, "Failed to close scanner session");
    }
    info!("Scanwerk stopped");
    Ok(())
}

/// How long in-flight HTTPS requests get to finish once shutdown starts.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

async fn serve_plain(app: Router, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, use_tls = false, "Started HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn serve_tls(app: Router, addr: &str, cert: &Path, key: &Path) -> anyhow::Result<()> {
    // rustls needs a process-wide crypto provider. Err only means one is
    // already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let tls = RustlsConfig::from_pem_file(cert, key).await.with_context(|| {
        format!(
            "failed to load TLS certificate {} and key {}",
            cert.display(),
            key.display()
        )
    })?;
    let socket: SocketAddr = tokio::net::lookup_host(addr)
        .await
        .with_context(|| format!("failed to resolve {addr}"))?
        .next()
        .with_context(|| format!("{addr} resolved to no address"))?;

    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });

    info!(address = %socket, use_tls = true, "Started HTTP server");
    axum_server::bind_rustls(socket, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("HTTPS server failed")
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
