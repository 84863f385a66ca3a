// SPDX-License-Identifier: GPL-3.0-only

//! Hardware flash LED control via Linux sysfs
//!
//! Flash LEDs appear under `/sys/class/leds/` as `*:flash` entries. The
//! torch path (brightness file) is group-writable on mobile distributions;
//! the strobe interface is root-only, so this module never touches it.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Flash operating mode requested over the plugin boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashMode {
    /// Flash LED is off
    #[default]
    Off,
    /// Torch mode, LED stays on for the whole session
    Torch,
}

impl From<bool> for FlashMode {
    fn from(enabled: bool) -> Self {
        if enabled { FlashMode::Torch } else { FlashMode::Off }
    }
}

/// A writable flash LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct FlashDevice {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Value range ceiling from the `max_brightness` file
    max_brightness: u32,
    /// Directory basename, e.g. "white:flash"
    name: String,
}

impl FlashDevice {
    /// Scan `/sys/class/leds/` for `*:flash` entries we can write to
    pub fn discover() -> Vec<FlashDevice> {
        let Ok(entries) = std::fs::read_dir(Path::new("/sys/class/leds")) else {
            debug!("Cannot read /sys/class/leds, flash discovery skipped");
            return Vec::new();
        };

        let mut devices: Vec<FlashDevice> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                // Entries look like "white:flash", "yellow:flash"
                if !name.ends_with(":flash") {
                    return None;
                }
                probe_led(entry.path(), name)
            })
            .collect();

        // Deterministic ordering (white before yellow)
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    /// Device name, e.g. "white:flash"
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set raw brightness value (0 = off, max_brightness = full)
    pub fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    /// Turn off the LED
    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness (0.0 = off, 1.0 = full)
    pub fn torch(&self, intensity: f32) -> io::Result<()> {
        let clamped = intensity.clamp(0.0, 1.0);
        let value = (clamped * self.max_brightness as f32).round() as u32;
        self.set_brightness(value)
    }
}

/// Probe one LED directory; `None` when it is unusable (bad metadata or a
/// brightness file this process may not write)
fn probe_led(led_path: PathBuf, name: &str) -> Option<FlashDevice> {
    let max_brightness_path = led_path.join("max_brightness");
    let max_brightness = std::fs::read_to_string(&max_brightness_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&v| v > 0);
    let Some(max_brightness) = max_brightness else {
        warn!(path = %max_brightness_path.display(), "Unreadable or zero max_brightness");
        return None;
    };

    let brightness_path = led_path.join("brightness");
    if let Err(e) = std::fs::OpenOptions::new().write(true).open(&brightness_path) {
        warn!(
            path = %brightness_path.display(),
            error = %e,
            "Flash LED found but not writable"
        );
        return None;
    }

    info!(name, max_brightness, "Discovered flash LED");

    Some(FlashDevice {
        path: led_path,
        max_brightness,
        name: name.to_string(),
    })
}

/// Apply a flash mode across all discovered devices
pub fn apply_mode(devices: &[FlashDevice], mode: FlashMode) {
    for dev in devices {
        let result = match mode {
            FlashMode::Off => dev.off(),
            FlashMode::Torch => dev.torch(1.0),
        };
        if let Err(e) = result {
            warn!(device = %dev.name, ?mode, error = %e, "Failed to set flash LED");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_option_flag() {
        assert_eq!(FlashMode::from(true), FlashMode::Torch);
        assert_eq!(FlashMode::from(false), FlashMode::Off);
    }
}
