// SPDX-License-Identifier: GPL-3.0-only

//! Capture options payload
//!
//! The host façade passes a JSON options object with every start-capture
//! command. This module deserializes it, fills in defaults, and validates
//! the combination before a session is created.

use crate::constants::{
    DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_FPS, DEFAULT_THUMBNAIL_RATIO,
};
use crate::errors::CameraError;
use serde::{Deserialize, Serialize};

/// How output images are handed back across the plugin boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseMode {
    /// Write files and report paths
    #[default]
    File,
    /// Return base64 data URLs inline
    Data,
}

/// Which physical camera to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    #[default]
    Front,
    Back,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

/// Focus behavior requested for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    /// Single autofocus sweep, then hold
    Auto,
    /// Continuous autofocus
    #[default]
    #[serde(alias = "continuous")]
    ContinuousAuto,
    /// Manual focus at a fixed lens position
    Fixed,
}

/// A width/height pair from the options payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeOption {
    pub width: u32,
    pub height: u32,
}

/// Normalized point-of-interest coordinates (0.0 ..= 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub x: f64,
    pub y: f64,
}

/// Options payload for the start-capture command
///
/// Field names and defaults follow the keys the web side sends; unknown
/// keys are ignored so older hosts keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureOptions {
    /// Output hand-back mode (`file` or `data`)
    #[serde(rename = "use")]
    pub use_mode: UseMode,
    /// Requested capture framerate
    pub fps: u32,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Preview crop offset within the canvas
    pub x: f64,
    pub y: f64,
    /// Canvas target size; falls back to width/height when absent
    pub canvas: Option<SizeOption>,
    /// Fullsize capture size; falls back to width/height when absent
    pub capture: Option<SizeOption>,
    /// Torch on/off at session start
    pub flash_mode: bool,
    /// Emit a thumbnail alongside each fullsize output
    pub has_thumbnail: bool,
    /// Thumbnail edge length relative to fullsize
    pub thumbnail_ratio: f64,
    /// Which camera to open
    pub camera_facing: LensFacing,
    /// Focus behavior; driver default when absent
    pub focus_mode: Option<FocusMode>,
    /// Lens position for [`FocusMode::Fixed`], normalized 0.0 ..= 1.0
    pub focus_distance: Option<f64>,
    /// Exposure bias in EV
    pub exposure_compensation: Option<f64>,
    /// Metering point of interest
    pub point_of_interest: Option<PointOfInterest>,
    /// Suppress per-frame output; only serve explicit one-shot requests
    pub generate_output_only_on_request: bool,
    /// Never produce fullsize output; fullsize requests fail fast
    pub disable_fullsize: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            use_mode: UseMode::default(),
            fps: DEFAULT_FPS,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            x: 0.0,
            y: 0.0,
            canvas: None,
            capture: None,
            flash_mode: false,
            has_thumbnail: true,
            thumbnail_ratio: DEFAULT_THUMBNAIL_RATIO,
            camera_facing: LensFacing::default(),
            focus_mode: None,
            focus_distance: None,
            exposure_compensation: None,
            point_of_interest: None,
            generate_output_only_on_request: false,
            disable_fullsize: false,
        }
    }
}

impl CaptureOptions {
    /// Parse an options payload, applying defaults for missing keys
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, CameraError> {
        let options: CaptureOptions = serde_json::from_value(payload.clone())
            .map_err(|e| CameraError::UnsupportedConfiguration(format!("bad options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject combinations no session could satisfy
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "capture size {}x{} has a zero dimension",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(CameraError::UnsupportedConfiguration(
                "framerate must be at least 1".into(),
            ));
        }
        if let Some(canvas) = &self.canvas
            && (canvas.width == 0 || canvas.height == 0)
        {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "canvas size {}x{} has a zero dimension",
                canvas.width, canvas.height
            )));
        }
        if let Some(capture) = &self.capture
            && (capture.width == 0 || capture.height == 0)
        {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "capture size {}x{} has a zero dimension",
                capture.width, capture.height
            )));
        }
        if !(self.thumbnail_ratio.is_finite() && self.thumbnail_ratio > 0.0)
            || self.thumbnail_ratio > 1.0
        {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "thumbnail ratio {} outside (0, 1]",
                self.thumbnail_ratio
            )));
        }
        if let Some(poi) = &self.point_of_interest
            && (!(0.0..=1.0).contains(&poi.x) || !(0.0..=1.0).contains(&poi.y))
        {
            return Err(CameraError::UnsupportedConfiguration(format!(
                "point of interest ({}, {}) outside unit square",
                poi.x, poi.y
            )));
        }
        Ok(())
    }

    /// Canvas target size, defaulting to the capture size
    pub fn canvas_size(&self) -> (u32, u32) {
        match &self.canvas {
            Some(s) => (s.width, s.height),
            None => (self.width, self.height),
        }
    }

    /// Fullsize output size, defaulting to the capture size
    pub fn capture_size(&self) -> (u32, u32) {
        match &self.capture {
            Some(s) => (s.width, s.height),
            None => (self.width, self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let options = CaptureOptions::default();
        assert_eq!(options.width, 352);
        assert_eq!(options.height, 288);
        assert_eq!(options.fps, 30);
        assert_eq!(options.use_mode, UseMode::File);
        assert_eq!(options.camera_facing, LensFacing::Front);
        assert!(options.has_thumbnail);
        assert!((options.thumbnail_ratio - 1.0 / 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parses_full_payload() {
        let payload = json!({
            "use": "data",
            "fps": 25,
            "width": 640,
            "height": 480,
            "canvas": { "width": 1080, "height": 1920 },
            "capture": { "width": 1280, "height": 720 },
            "flashMode": true,
            "hasThumbnail": false,
            "thumbnailRatio": 0.25,
            "cameraFacing": "back",
            "focusMode": "fixed",
            "focusDistance": 0.4,
            "exposureCompensation": -1.5,
            "pointOfInterest": { "x": 0.5, "y": 0.25 },
            "generateOutputOnlyOnRequest": true,
            "disableFullsize": true
        });

        let options = CaptureOptions::from_payload(&payload).unwrap();
        assert_eq!(options.use_mode, UseMode::Data);
        assert_eq!(options.fps, 25);
        assert_eq!(options.canvas_size(), (1080, 1920));
        assert_eq!(options.capture_size(), (1280, 720));
        assert_eq!(options.camera_facing, LensFacing::Back);
        assert_eq!(options.focus_mode, Some(FocusMode::Fixed));
        assert!(options.disable_fullsize);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let options = CaptureOptions::from_payload(&json!({ "fps": 15 })).unwrap();
        assert_eq!(options.fps, 15);
        assert_eq!(options.width, 352);
        assert_eq!(options.canvas_size(), (352, 288));
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = CaptureOptions::from_payload(&json!({ "width": 0 })).unwrap_err();
        assert!(matches!(err, CameraError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn bad_thumbnail_ratio_rejected() {
        let err = CaptureOptions::from_payload(&json!({ "thumbnailRatio": 0.0 })).unwrap_err();
        assert!(matches!(err, CameraError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn continuous_alias_accepted() {
        let options =
            CaptureOptions::from_payload(&json!({ "focusMode": "continuous" })).unwrap();
        assert_eq!(options.focus_mode, Some(FocusMode::ContinuousAuto));
    }
}
