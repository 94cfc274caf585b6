// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SANE backend driven through the `scanimage` command-line front end.
//
// Opening a device runs `scanimage -d <device> -A` and reads the option
// listing for the current mode, resolution and geometry. Options are then
// kept locally and passed on the command line of each read, which asks for
// PNM on stdout.
//
// scanimage spells geometry as left/top/width/height (`-l -t -x -y`); the
// handle converts to and from the corner form used everywhere else.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{DynamicImage, ImageFormat};
use scanwerk_core::error::{Result, ScanError};
use tracing::{debug, info, instrument};

use crate::traits::{DeviceHandle, OptionValue, ScannerBackend, option_names};

/// Backend that shells out to `scanimage`.
#[derive(Debug, Clone)]
pub struct ScanimageBackend {
    program: PathBuf,
}

impl ScanimageBackend {
    /// Check that `program` runs and report its version.
    pub fn init(program: &Path) -> Result<Self> {
        let output = Command::new(program)
            .arg("--version")
            .output()
            .map_err(|e| {
                ScanError::BackendUnavailable(format!("cannot run {}: {e}", program.display()))
            })?;
        if !output.status.success() {
            return Err(ScanError::BackendUnavailable(format!(
                "{} --version failed: {}",
                program.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        info!(version = %version.trim(), "SANE initialised");
        Ok(Self {
            program: program.to_path_buf(),
        })
    }
}

impl ScannerBackend for ScanimageBackend {
    fn name(&self) -> &str {
        "scanimage"
    }

    #[instrument(skip(self))]
    fn open(&self, device: &str) -> Result<Box<dyn DeviceHandle>> {
        let output = run(Command::new(&self.program).args(["-d", device, "-A"]))?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let options = device_options(&listing).map_err(|reason| ScanError::DeviceConnection {
            device: device.to_string(),
            reason,
        })?;
        debug!(count = options.len(), "read device options");

        Ok(Box::new(ScanimageHandle {
            program: self.program.clone(),
            device: device.to_string(),
            options,
        }))
    }
}

struct ScanimageHandle {
    program: PathBuf,
    device: String,
    options: HashMap<String, OptionValue>,
}

impl ScanimageHandle {
    fn numeric(&self, name: &str) -> Result<f64> {
        self.get_option(name)?
            .as_f64()
            .ok_or_else(|| ScanError::DeviceIo(format!("option {name} is not numeric")))
    }

    /// Command-line arguments for a read with the current options.
    fn read_args(&self) -> Result<Vec<String>> {
        let tl_x = self.numeric(option_names::TL_X)?;
        let tl_y = self.numeric(option_names::TL_Y)?;
        let width = self.numeric(option_names::BR_X)? - tl_x;
        let height = self.numeric(option_names::BR_Y)? - tl_y;

        let mut args = vec![
            "-d".to_string(),
            self.device.clone(),
            "--format=pnm".to_string(),
        ];
        if let Some(mode) = self.options.get(option_names::MODE) {
            args.push("--mode".into());
            args.push(mode.to_string());
        }
        if let Some(resolution) = self.options.get(option_names::RESOLUTION) {
            args.push("--resolution".into());
            args.push(resolution.to_string());
        }
        for (flag, value) in [("-l", tl_x), ("-t", tl_y), ("-x", width), ("-y", height)] {
            args.push(flag.into());
            args.push(OptionValue::Fixed(value).to_string());
        }
        Ok(args)
    }
}

impl DeviceHandle for ScanimageHandle {
    fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        debug!(name, %value, "set option");
        self.options.insert(name.to_string(), value);
        Ok(())
    }

    fn get_option(&self, name: &str) -> Result<OptionValue> {
        self.options
            .get(name)
            .cloned()
            .ok_or_else(|| ScanError::DeviceIo(format!("device has no option {name}")))
    }

    fn read_image(&mut self) -> Result<DynamicImage> {
        let args = self.read_args()?;
        debug!(?args, "running scanimage");
        let output = run(Command::new(&self.program).args(&args))?;

        image::load_from_memory_with_format(&output.stdout, ImageFormat::Pnm)
            .map_err(|e| ScanError::DeviceIo(format!("unreadable scan data: {e}")))
    }
}

/// Run `command`, mapping a failed exit to `DeviceBusy` or `DeviceIo`.
fn run(command: &mut Command) -> Result<Output> {
    let output = command
        .output()
        .map_err(|e| ScanError::DeviceIo(format!("failed to run scanimage: {e}")))?;
    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.to_ascii_lowercase().contains("busy") {
        return Err(ScanError::DeviceBusy);
    }
    Err(ScanError::DeviceIo(stderr.trim().to_string()))
}

/// One option line from `scanimage -A`: its name and default value.
fn parse_option_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if !line.starts_with('-') {
        return None;
    }

    let token = line.split_whitespace().next()?;
    let name = token.trim_start_matches('-');
    let name = name.split('[').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }

    let default = line
        .strip_suffix(']')
        .and_then(|rest| rest.rsplit_once('['))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty() && *value != "inactive")?;

    Some((name.to_string(), default.to_string()))
}

/// Parse a `scanimage -A` listing into options keyed by their SANE names.
///
/// Geometry is required; mode and resolution are taken when present.
fn device_options(listing: &str) -> std::result::Result<HashMap<String, OptionValue>, String> {
    let raw: HashMap<String, String> = listing.lines().filter_map(parse_option_line).collect();

    let number = |short: &str| -> std::result::Result<f64, String> {
        let value = raw
            .get(short)
            .ok_or_else(|| format!("device does not report option -{short}"))?;
        value
            .trim_end_matches("mm")
            .parse()
            .map_err(|_| format!("option -{short} has non-numeric default {value:?}"))
    };

    let left = number("l")?;
    let top = number("t")?;
    let width = number("x")?;
    let height = number("y")?;

    let mut options = HashMap::from([
        (option_names::TL_X.to_string(), OptionValue::Fixed(left)),
        (option_names::TL_Y.to_string(), OptionValue::Fixed(top)),
        (option_names::BR_X.to_string(), OptionValue::Fixed(left + width)),
        (option_names::BR_Y.to_string(), OptionValue::Fixed(top + height)),
    ]);

    if let Some(mode) = raw.get(option_names::MODE) {
        options.insert(option_names::MODE.to_string(), OptionValue::Text(mode.clone()));
    }
    if let Some(resolution) = raw
        .get(option_names::RESOLUTION)
        .and_then(|r| r.trim_end_matches("dpi").parse::<i64>().ok())
    {
        options.insert(
            option_names::RESOLUTION.to_string(),
            OptionValue::Int(resolution),
        );
    }
    Ok(options)
}
