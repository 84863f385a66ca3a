// SPDX-License-Identifier: GPL-3.0-only

//! Camera device discovery
//!
//! Scans `/dev/video*` nodes, filters out metadata-only devices via
//! `VIDIOC_QUERYCAP`, and classifies sensor facing from the reported card
//! name so lens selection can pick front vs. back.

use std::os::unix::io::{AsRawFd, RawFd};
use tracing::debug;

use super::types::{CameraDevice, CameraResult};
use crate::config::LensFacing;
use crate::errors::CameraError;

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// Device supports video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// Query V4L2 capabilities for an open file descriptor
fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

fn fixed_bytes_to_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).to_string()
}

/// Best-effort facing classification from the device name
///
/// Mobile platforms name sensors explicitly ("Front Camera"); laptops
/// expose a single integrated camera which behaves as front-facing.
pub fn classify_facing(card: &str) -> Option<LensFacing> {
    let lowered = card.to_ascii_lowercase();
    if lowered.contains("front") || lowered.contains("integrated") {
        Some(LensFacing::Front)
    } else if lowered.contains("back") || lowered.contains("rear") {
        Some(LensFacing::Back)
    } else {
        None
    }
}

/// Probe one device node; `None` when it is not a capture device
fn probe_device(path: &str) -> Option<CameraDevice> {
    let file = std::fs::File::open(path).ok()?;
    let cap = query_v4l2_cap(file.as_raw_fd())?;

    if cap.device_caps & V4L2_CAP_VIDEO_CAPTURE == 0 {
        return None;
    }

    let card = fixed_bytes_to_string(&cap.card);
    let driver = fixed_bytes_to_string(&cap.driver);
    let facing = classify_facing(&card);

    debug!(path, card = %card, driver = %driver, ?facing, "Found capture device");

    Some(CameraDevice {
        path: path.to_string(),
        card,
        driver,
        facing,
    })
}

/// Enumerate all capture-capable camera devices
pub fn enumerate_devices() -> Vec<CameraDevice> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut devices: Vec<CameraDevice> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if !name.starts_with("video") {
                return None;
            }
            probe_device(&format!("/dev/{}", name))
        })
        .collect();

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

/// Pick the device for the requested lens facing
///
/// Falls back to the first capture device when no facing matches; errors
/// distinguish an empty system from one we may not touch.
pub fn select_device(facing: LensFacing) -> CameraResult<CameraDevice> {
    let devices = enumerate_devices();

    if let Some(device) = devices.iter().find(|d| d.facing == Some(facing)) {
        return Ok(device.clone());
    }

    if let Some(device) = devices.first() {
        debug!(
            requested = %facing,
            selected = %device.path,
            "No device matches requested facing; using first capture device"
        );
        return Ok(device.clone());
    }

    // Distinguish "nothing there" from "not allowed to look"
    let nodes_exist = std::fs::read_dir("/dev")
        .map(|entries| {
            entries.flatten().any(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with("video"))
            })
        })
        .unwrap_or(false);

    if nodes_exist {
        let probe = std::fs::File::open("/dev/video0");
        if let Err(e) = probe
            && e.kind() == std::io::ErrorKind::PermissionDenied
        {
            return Err(CameraError::PermissionDenied(
                "camera device nodes exist but are not readable".into(),
            ));
        }
    }

    Err(CameraError::DeviceUnavailable(
        "no capture-capable camera device found".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_classification() {
        assert_eq!(classify_facing("Front Camera: ov5640"), Some(LensFacing::Front));
        assert_eq!(classify_facing("Rear Camera"), Some(LensFacing::Back));
        assert_eq!(classify_facing("IMX371 back sensor"), Some(LensFacing::Back));
        assert_eq!(classify_facing("Integrated Webcam"), Some(LensFacing::Front));
        assert_eq!(classify_facing("HD USB Camera"), None);
    }

    #[test]
    fn fixed_bytes_stop_at_nul() {
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(b"uvc\0");
        assert_eq!(fixed_bytes_to_string(&bytes), "uvc");
    }
}
