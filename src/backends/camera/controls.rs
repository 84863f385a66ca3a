// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera control interface
//!
//! Raw ioctl access to the driver controls backing the session operations:
//! focus, exposure compensation, zoom, and metering point of interest.
//! Requested values are mapped onto the driver-reported range and clamped.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

use crate::config::FocusMode;
use crate::errors::CameraError;

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;

const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

// ===== V4L2 Control IDs (Camera Class) =====

/// Exposure mode: Auto, Manual, Shutter Priority, Aperture Priority
pub const V4L2_CID_EXPOSURE_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 1;
/// Focus control (manual focus position)
pub const V4L2_CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
/// Auto focus enable
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
/// Zoom position
pub const V4L2_CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
/// Exposure compensation (EV bias) in 0.001 EV units
pub const V4L2_CID_AUTO_EXPOSURE_BIAS: u32 = V4L2_CID_CAMERA_CLASS_BASE + 19;
/// Exposure metering mode
pub const V4L2_CID_EXPOSURE_METERING: u32 = V4L2_CID_CAMERA_CLASS_BASE + 25;

/// Spot metering on the configured point
pub const V4L2_EXPOSURE_METERING_SPOT: i32 = 2;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// ===== V4L2 ioctl Numbers =====

/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

// ===== V4L2 ioctl Structures =====

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Information about a V4L2 control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    /// Map a normalized 0.0 ..= 1.0 value onto this control's range
    pub fn denormalize(&self, normalized: f64) -> i32 {
        let clamped = normalized.clamp(0.0, 1.0);
        let span = (self.maximum - self.minimum) as f64;
        self.minimum + (span * clamped).round() as i32
    }
}

/// Driver control names arrive as fixed NUL-padded byte arrays
fn extract_name(bytes: &[u8; 32]) -> String {
    let name_len = bytes.iter().position(|&c| c == 0).unwrap_or(32);
    String::from_utf8_lossy(&bytes[..name_len]).to_string()
}

/// Look up a control's range and flags; `None` when the driver lacks it
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };

    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Read a control's current value
pub fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };

    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }

    Some(ctrl.value)
}

/// Write a control value; the driver may clamp it further
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), CameraError> {
    let file = File::open(device_path)
        .map_err(|e| CameraError::ControlFailed(format!("open {}: {}", device_path, e)))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };

    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(CameraError::ControlFailed(format!(
            "control {:#010x}: {}",
            control_id, errno
        )));
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped by the driver"
        );
    }

    Ok(())
}

/// Whether the driver exposes an enabled control with this id
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id)
        .map(|info| !info.is_disabled())
        .unwrap_or(false)
}

/// Query a control, erroring when the driver does not expose it
fn require_control(device_path: &str, control_id: u32) -> Result<ControlInfo, CameraError> {
    match query_control(device_path, control_id) {
        Some(info) if !info.is_disabled() => Ok(info),
        _ => Err(CameraError::ControlFailed(format!(
            "device does not expose control {:#010x}",
            control_id
        ))),
    }
}

/// Apply a focus mode, with an optional normalized lens position for
/// [`FocusMode::Fixed`]
pub fn apply_focus(
    device_path: &str,
    mode: FocusMode,
    distance: Option<f64>,
) -> Result<(), CameraError> {
    match mode {
        FocusMode::Auto | FocusMode::ContinuousAuto => {
            set_control(device_path, V4L2_CID_FOCUS_AUTO, 1)
        }
        FocusMode::Fixed => {
            // Autofocus must be off before the lens position sticks
            if has_control(device_path, V4L2_CID_FOCUS_AUTO) {
                set_control(device_path, V4L2_CID_FOCUS_AUTO, 0)?;
            }
            let info = require_control(device_path, V4L2_CID_FOCUS_ABSOLUTE)?;
            let position = info.denormalize(distance.unwrap_or(0.0));
            set_control(device_path, V4L2_CID_FOCUS_ABSOLUTE, position)
        }
    }
}

/// Apply an exposure compensation bias in EV
pub fn apply_exposure_bias(device_path: &str, ev: f64) -> Result<(), CameraError> {
    let info = require_control(device_path, V4L2_CID_AUTO_EXPOSURE_BIAS)?;
    // The control is specified in 0.001 EV units
    let raw = (ev * 1000.0).round() as i32;
    let clamped = raw.clamp(info.minimum, info.maximum);
    if let Some(previous) = get_control(device_path, V4L2_CID_AUTO_EXPOSURE_BIAS) {
        debug!(previous, requested = clamped, "Updating exposure bias");
    }
    set_control(device_path, V4L2_CID_AUTO_EXPOSURE_BIAS, clamped)
}

/// Apply a zoom factor; 1.0 is the widest position
pub fn apply_zoom(device_path: &str, factor: f64) -> Result<(), CameraError> {
    if !(factor.is_finite() && factor >= 1.0) {
        return Err(CameraError::UnsupportedConfiguration(format!(
            "zoom factor {} below 1.0",
            factor
        )));
    }
    let info = require_control(device_path, V4L2_CID_ZOOM_ABSOLUTE)?;
    // Drivers report zoom as an absolute position; treat max as ~8x
    let normalized = ((factor - 1.0) / 7.0).clamp(0.0, 1.0);
    set_control(device_path, V4L2_CID_ZOOM_ABSOLUTE, info.denormalize(normalized))
}

/// Steer metering toward a point of interest
///
/// V4L2 has no per-point metering region for UVC devices; the closest
/// supported behavior is switching the metering mode to spot.
pub fn apply_point_of_interest(device_path: &str, x: f64, y: f64) -> Result<(), CameraError> {
    debug!(device_path, x, y, "Applying metering point of interest");
    let info = require_control(device_path, V4L2_CID_EXPOSURE_METERING)?;
    if V4L2_EXPOSURE_METERING_SPOT > info.maximum {
        return Err(CameraError::ControlFailed(
            "device does not support spot metering".into(),
        ));
    }
    set_control(
        device_path,
        V4L2_CID_EXPOSURE_METERING,
        V4L2_EXPOSURE_METERING_SPOT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_id_values() {
        assert_eq!(V4L2_CID_EXPOSURE_AUTO, 0x009a0901);
        assert_eq!(V4L2_CID_FOCUS_ABSOLUTE, 0x009a090a);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a090c);
        assert_eq!(V4L2_CID_ZOOM_ABSOLUTE, 0x009a090d);
        assert_eq!(V4L2_CID_AUTO_EXPOSURE_BIAS, 0x009a0913);
        assert_eq!(V4L2_CID_EXPOSURE_METERING, 0x009a0919);
    }

    #[test]
    fn denormalize_maps_onto_driver_range() {
        let info = ControlInfo {
            id: 0,
            name: String::new(),
            minimum: -100,
            maximum: 100,
            step: 1,
            default_value: 0,
            flags: 0,
        };
        assert_eq!(info.denormalize(0.0), -100);
        assert_eq!(info.denormalize(0.5), 0);
        assert_eq!(info.denormalize(1.0), 100);
        // Out-of-range input clamps instead of extrapolating
        assert_eq!(info.denormalize(2.0), 100);
        assert_eq!(info.denormalize(-1.0), -100);
    }

    #[test]
    fn zoom_below_one_rejected() {
        let err = apply_zoom("/dev/null", 0.5).unwrap_err();
        assert!(matches!(err, CameraError::UnsupportedConfiguration(_)));
    }
}
