// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device session: the single owner of the scanner connection.
//
// The session is either disconnected or connected with the scan window the
// device reported when the connection was opened. That window is the "full
// bed" and is reprogrammed before every full-area capture, since an earlier
// partial-area capture leaves its own window set on the device.
//
// All device work happens under one mutex: option changes and the read for a
// capture are never interleaved with another capture. Every call blocks; from
// async code run it inside `tokio::task::spawn_blocking`.

use std::sync::{Mutex, MutexGuard};

use image::DynamicImage;
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::{ColorMode, PhysicalArea, PixelArea, ScanArea};
use tracing::{debug, info, instrument, warn};

use crate::traits::{DeviceHandle, OptionValue, ScannerBackend, option_names};

/// What the session needs to know about the device it manages.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Device name passed to the backend.
    pub device_name: String,
    /// Colour mode set on every new connection.
    pub mode: ColorMode,
    /// Resolution previews are taken at. Pixel rectangles are always
    /// interpreted at this resolution.
    pub preview_res: u32,
}

enum ConnectionState {
    Disconnected,
    Connected {
        handle: Box<dyn DeviceHandle>,
        /// Window reported by the device at connect time.
        default_area: PhysicalArea,
    },
}

/// Exclusive, lazily (re)connecting session with one scanner.
pub struct DeviceSession {
    backend: Box<dyn ScannerBackend>,
    settings: SessionSettings,
    state: Mutex<ConnectionState>,
}

impl DeviceSession {
    /// Create a disconnected session. Call [`connect`](Self::connect) to open
    /// the device eagerly, or let the first capture do it.
    pub fn new(backend: Box<dyn ScannerBackend>, settings: SessionSettings) -> Self {
        Self {
            backend,
            settings,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Open the device if it is not already open.
    ///
    /// On failure the session stays disconnected and the next capture tries
    /// again.
    pub fn connect(&self) -> Result<()> {
        let mut state = self.lock()?;
        self.ensure_connected(&mut state).map(|_| ())
    }

    /// Drop the connection. The next capture reconnects.
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock()?;
        if matches!(*state, ConnectionState::Connected { .. }) {
            info!(name = %self.settings.device_name, "Closing device connection");
        }
        *state = ConnectionState::Disconnected;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.lock()
            .map(|state| matches!(*state, ConnectionState::Connected { .. }))
            .unwrap_or(false)
    }

    /// Full-bed window remembered from the current connection.
    pub fn default_area(&self) -> Option<PhysicalArea> {
        match &*self.lock().ok()? {
            ConnectionState::Connected { default_area, .. } => Some(*default_area),
            ConnectionState::Disconnected => None,
        }
    }

    /// Scan at `resolution` DPI, over `area` if given or the full bed
    /// otherwise.
    ///
    /// `area` is in preview pixels and is converted to millimetres using the
    /// preview resolution, whatever `resolution` is. The converted window is
    /// clamped to the default area; one that misses the bed entirely is a
    /// [`ScanError::MalformedRect`].
    #[instrument(skip(self, area), fields(with_rect = area.is_some()))]
    pub fn capture(&self, resolution: u32, area: Option<&PixelArea>) -> Result<DynamicImage> {
        info!(resolution, "Reading image");

        let mut state = self.lock()?;
        let (handle, default_area) = self.ensure_connected(&mut state)?;

        // Nothing is programmed until the window is known to fit the bed.
        let window = match area {
            Some(pixels) => {
                let requested = pixels.to_physical(self.settings.preview_res);
                let window = requested.clamp_to(&default_area).ok_or_else(|| {
                    ScanError::MalformedRect(format!(
                        "rectangle {},{} to {},{} px lies outside the scan bed",
                        pixels.tl_x, pixels.tl_y, pixels.br_x, pixels.br_y
                    ))
                })?;
                if window != requested {
                    debug!(
                        requested_brx_mm = requested.br_x,
                        requested_bry_mm = requested.br_y,
                        "Clamped scanning area to the bed"
                    );
                }
                Some(window)
            }
            None => None,
        };

        handle.set_option(
            option_names::RESOLUTION,
            OptionValue::Int(i64::from(resolution)),
        )?;

        match window {
            Some(window) => {
                program_window(handle.as_mut(), &window)?;
                info!(
                    tlx_mm = window.tl_x,
                    tly_mm = window.tl_y,
                    brx_mm = window.br_x,
                    bry_mm = window.br_y,
                    "Set scanning area"
                );
            }
            None => {
                program_window(handle.as_mut(), &default_area)?;
                debug!("Restored full scanning area");
            }
        }

        let image = handle.read_image()?;
        debug!(width = image.width(), height = image.height(), "Image read");
        Ok(image)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConnectionState>> {
        self.state
            .lock()
            .map_err(|_| ScanError::DeviceIo("device session lock poisoned".into()))
    }

    /// Connect if needed and hand back the live handle and default window.
    fn ensure_connected<'a>(
        &self,
        state: &'a mut ConnectionState,
    ) -> Result<(&'a mut Box<dyn DeviceHandle>, PhysicalArea)> {
        if let ConnectionState::Disconnected = state {
            match self.open_connection() {
                Ok((handle, default_area)) => {
                    *state = ConnectionState::Connected {
                        handle,
                        default_area,
                    };
                }
                Err(err) => {
                    warn!(
                        name = %self.settings.device_name,
                        error = %err,
                        "Failed to connect to device"
                    );
                    return Err(err);
                }
            }
        }

        match state {
            ConnectionState::Connected {
                handle,
                default_area,
            } => Ok((handle, *default_area)),
            ConnectionState::Disconnected => Err(ScanError::DeviceConnection {
                device: self.settings.device_name.clone(),
                reason: "not connected".into(),
            }),
        }
    }

    /// Open the device, set the mode, and read the default window.
    fn open_connection(&self) -> Result<(Box<dyn DeviceHandle>, PhysicalArea)> {
        let device = &self.settings.device_name;
        let connection_error = |err: ScanError| match err {
            ScanError::DeviceBusy | ScanError::DeviceConnection { .. } => err,
            other => ScanError::DeviceConnection {
                device: device.clone(),
                reason: other.to_string(),
            },
        };

        let mut handle = self.backend.open(device).map_err(connection_error)?;
        handle
            .set_option(
                option_names::MODE,
                OptionValue::Text(self.settings.mode.as_str().to_string()),
            )
            .map_err(connection_error)?;
        let default_area = read_window(handle.as_ref()).map_err(connection_error)?;

        info!(
            name = %device,
            backend = self.backend.name(),
            width_mm = default_area.width_mm(),
            height_mm = default_area.height_mm(),
            "Connected to device"
        );
        Ok((handle, default_area))
    }
}

/// Read the current scan window off the device.
fn read_window(handle: &dyn DeviceHandle) -> Result<PhysicalArea> {
    let mut corners = [0.0f64; 4];
    for (slot, name) in corners.iter_mut().zip(option_names::WINDOW) {
        let value = handle.get_option(name)?;
        *slot = value
            .as_f64()
            .ok_or_else(|| ScanError::DeviceIo(format!("option {name} is not numeric: {value}")))?;
    }
    let [tl_x, tl_y, br_x, br_y] = corners;
    Ok(ScanArea {
        tl_x,
        tl_y,
        br_x,
        br_y,
    })
}

fn program_window(handle: &mut dyn DeviceHandle, window: &PhysicalArea) -> Result<()> {
    let corners = [window.tl_x, window.tl_y, window.br_x, window.br_y];
    for (name, value) in option_names::WINDOW.into_iter().zip(corners) {
        handle.set_option(name, OptionValue::Fixed(value))?;
    }
    Ok(())
}
