// SPDX-License-Identifier: GPL-3.0-only

//! Outgoing event payloads
//!
//! Everything the core reports back across the plugin boundary: per-frame
//! preview payloads, one-shot still payloads, recording completion, and
//! classified errors. All payloads serialize to the JSON shape the web
//! side consumes.

use serde::Serialize;

use crate::config::UseMode;
use crate::errors::ErrorKind;
use crate::pipelines::photo::EncodedImage;
use crate::render::ViewportRect;

/// Channel the core emits events through; the façade forwards them to the
/// host container
pub type EventSender = tokio::sync::mpsc::UnboundedSender<PluginEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<PluginEvent>;

/// Canvas draw coordinates for one image
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawCoordinates {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<ViewportRect> for DrawCoordinates {
    fn from(rect: ViewportRect) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// One encoded image crossing the boundary
///
/// Exactly one of `file`/`data` is set, per the session's output mode.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// Path to the written file (`file` output mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Base64 data URL (`data` output mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Canvas orientation implied by the image dimensions
    pub orientation: Orientation,
    /// Sensor rotation to apply when drawing; 0 on this backend, which
    /// delivers pre-rotated frames
    pub rotation: u32,
    /// Where to draw the image on the canvas
    pub coordinates: DrawCoordinates,
}

impl ImagePayload {
    /// Build a payload from an encoded image already delivered per the
    /// output mode
    pub fn new(
        encoded: &EncodedImage,
        use_mode: UseMode,
        file: Option<String>,
        coordinates: DrawCoordinates,
    ) -> Self {
        let data = match use_mode {
            UseMode::File => None,
            UseMode::Data => Some(encoded.to_data_url()),
        };
        Self {
            file,
            data,
            width: encoded.width,
            height: encoded.height,
            orientation: Orientation::of(encoded.width, encoded.height),
            rotation: 0,
            coordinates,
        }
    }
}

/// Canvas orientation of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Events emitted by the core to the façade
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PluginEvent {
    /// Per-frame preview output
    #[serde(rename_all = "camelCase")]
    Preview {
        #[serde(skip_serializing_if = "Option::is_none")]
        fullsize: Option<ImagePayload>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbnail: Option<ImagePayload>,
    },
    /// One-shot fullsize capture result
    Fullsize { image: ImagePayload },
    /// One-shot thumbnail capture result
    Thumbnail { image: ImagePayload },
    /// Finished video recording
    #[serde(rename_all = "camelCase")]
    RecordingComplete { file: String },
    /// Classified error payload
    #[serde(rename_all = "camelCase")]
    Error { kind: String, message: String },
}

impl PluginEvent {
    /// Build an error payload from any core error
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        PluginEvent::Error {
            kind: kind.as_str().to_string(),
            message: message.into(),
        }
    }
}
