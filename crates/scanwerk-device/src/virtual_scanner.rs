// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process virtual flatbed for tests, demos and CI hosts without SANE.
//
// Reads produce a gradient raster sized from the programmed window and
// resolution. Clones share state, so a test can keep one clone as a remote
// control (inject connect failures, make the device busy, swap the bed size)
// while the session owns the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use scanwerk_core::error::{Result, ScanError};
use scanwerk_core::types::{PhysicalArea, ScanArea};
use scanwerk_core::units::mm_to_pixels;
use tracing::debug;

use crate::traits::{DeviceHandle, OptionValue, ScannerBackend, option_names};

/// Letter width by A4 length, a typical consumer flatbed.
pub const DEFAULT_BED: PhysicalArea = ScanArea {
    tl_x: 0.0,
    tl_y: 0.0,
    br_x: 215.9,
    br_y: 297.18,
};

const DEFAULT_RESOLUTION: i64 = 75;

/// Counters and last-programmed values, for assertions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualStats {
    /// Successful opens.
    pub opens: usize,
    /// Successful reads.
    pub reads: usize,
    /// Window in effect for the most recent read.
    pub last_window: Option<PhysicalArea>,
    /// Resolution in effect for the most recent read.
    pub last_resolution: Option<u32>,
    /// Last mode set on any handle.
    pub mode: Option<String>,
    /// Reads currently between start and finish.
    pub in_flight: usize,
    /// Highest `in_flight` ever observed.
    pub max_in_flight: usize,
}

#[derive(Debug)]
struct VirtualState {
    bed: PhysicalArea,
    failing_connects: usize,
    busy: bool,
    read_delay: Duration,
    stats: VirtualStats,
}

/// Virtual scanner backend. Cheap to clone; clones share the same device.
#[derive(Debug, Clone)]
pub struct VirtualScanner {
    state: Arc<Mutex<VirtualState>>,
}

impl Default for VirtualScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualScanner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                bed: DEFAULT_BED,
                failing_connects: 0,
                busy: false,
                read_delay: Duration::ZERO,
                stats: VirtualStats::default(),
            })),
        }
    }

    /// Make the next `count` opens fail with a connection error.
    pub fn fail_next_connects(&self, count: usize) {
        self.lock_state().failing_connects = count;
    }

    /// While busy, opens and reads fail with [`ScanError::DeviceBusy`].
    pub fn set_busy(&self, busy: bool) {
        self.lock_state().busy = busy;
    }

    /// Make every read take at least `delay`, like a real scan head moving.
    pub fn set_read_delay(&self, delay: Duration) {
        self.lock_state().read_delay = delay;
    }

    /// Change the window reported to new connections.
    pub fn set_bed(&self, bed: PhysicalArea) {
        self.lock_state().bed = bed;
    }

    pub fn bed(&self) -> PhysicalArea {
        self.lock_state().bed
    }

    pub fn stats(&self) -> VirtualStats {
        self.lock_state().stats.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, VirtualState> {
        lock(&self.state)
    }
}

// A panic while holding the lock leaves plain counters behind, nothing that
// can be half-updated, so recover the guard.
fn lock(state: &Mutex<VirtualState>) -> MutexGuard<'_, VirtualState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScannerBackend for VirtualScanner {
    fn name(&self) -> &str {
        "virtual"
    }

    fn open(&self, device: &str) -> Result<Box<dyn DeviceHandle>> {
        let mut state = self.lock_state();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(ScanError::DeviceConnection {
                device: device.to_string(),
                reason: "virtual device unplugged".into(),
            });
        }
        if state.busy {
            return Err(ScanError::DeviceBusy);
        }
        state.stats.opens += 1;

        let bed = state.bed;
        let options = HashMap::from([
            (option_names::MODE.to_string(), OptionValue::Text("Color".into())),
            (
                option_names::RESOLUTION.to_string(),
                OptionValue::Int(DEFAULT_RESOLUTION),
            ),
            (option_names::TL_X.to_string(), OptionValue::Fixed(bed.tl_x)),
            (option_names::TL_Y.to_string(), OptionValue::Fixed(bed.tl_y)),
            (option_names::BR_X.to_string(), OptionValue::Fixed(bed.br_x)),
            (option_names::BR_Y.to_string(), OptionValue::Fixed(bed.br_y)),
        ]);
        debug!(device, "virtual device opened");

        Ok(Box::new(VirtualHandle {
            shared: Arc::clone(&self.state),
            options,
        }))
    }
}

struct VirtualHandle {
    shared: Arc<Mutex<VirtualState>>,
    options: HashMap<String, OptionValue>,
}

impl VirtualHandle {
    fn numeric(&self, name: &str) -> Result<f64> {
        self.get_option(name)?
            .as_f64()
            .ok_or_else(|| ScanError::DeviceIo(format!("option {name} is not numeric")))
    }

    fn window(&self) -> Result<PhysicalArea> {
        Ok(ScanArea {
            tl_x: self.numeric(option_names::TL_X)?,
            tl_y: self.numeric(option_names::TL_Y)?,
            br_x: self.numeric(option_names::BR_X)?,
            br_y: self.numeric(option_names::BR_Y)?,
        })
    }
}

impl DeviceHandle for VirtualHandle {
    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        if name == option_names::MODE {
            lock(&self.shared).stats.mode = Some(value.to_string());
        }
        self.options.insert(name.to_string(), value);
        Ok(())
    }

    fn get_option(&self, name: &str) -> Result<OptionValue> {
        self.options
            .get(name)
            .cloned()
            .ok_or_else(|| ScanError::DeviceIo(format!("unknown option {name}")))
    }

    fn read_image(&mut self) -> Result<DynamicImage> {
        let window = self.window()?;
        let resolution = self.numeric(option_names::RESOLUTION)?.round().max(1.0) as u32;
        let gray = matches!(
            self.options.get(option_names::MODE),
            Some(OptionValue::Text(mode)) if mode == "Gray" || mode == "Lineart"
        );

        let delay = {
            let mut state = lock(&self.shared);
            if state.busy {
                return Err(ScanError::DeviceBusy);
            }
            state.stats.reads += 1;
            state.stats.last_window = Some(window);
            state.stats.last_resolution = Some(resolution);
            state.stats.in_flight += 1;
            state.stats.max_in_flight = state.stats.max_in_flight.max(state.stats.in_flight);
            state.read_delay
        };

        // The shared state is not held while "scanning", so overlapping reads
        // from two handles show up in `max_in_flight`.
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let width = mm_to_pixels(window.width_mm(), resolution).max(1);
        let height = mm_to_pixels(window.height_mm(), resolution).max(1);
        debug!(width, height, resolution, "virtual read");

        let image = if gray {
            DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
                Luma([((x + y) % 256) as u8])
            }))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
            }))
        };
        lock(&self.shared).stats.in_flight -= 1;
        Ok(image)
    }
}
