// SPDX-License-Identifier: GPL-3.0-only

//! Container muxing for video recordings
//!
//! Creates the muxer/filesink tail of the recording pipeline and stamps the
//! fixed recording orientation into the container metadata.

use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::EncodeError;

/// Device orientation captured at record start
///
/// Stored as a container tag; orientation changes mid-recording do not
/// retroactively affect already-muxed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingOrientation {
    #[default]
    LandscapeRight,
    Portrait,
    LandscapeLeft,
    PortraitUpsideDown,
}

impl RecordingOrientation {
    /// Clockwise display rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            RecordingOrientation::LandscapeRight => 0,
            RecordingOrientation::Portrait => 90,
            RecordingOrientation::LandscapeLeft => 180,
            RecordingOrientation::PortraitUpsideDown => 270,
        }
    }

    /// Parse from a rotation in degrees (normalized to 0-360)
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => RecordingOrientation::Portrait,
            180 => RecordingOrientation::LandscapeLeft,
            270 => RecordingOrientation::PortraitUpsideDown,
            _ => RecordingOrientation::LandscapeRight,
        }
    }

    /// GStreamer image-orientation tag value
    pub fn tag_value(&self) -> &'static str {
        match self {
            RecordingOrientation::LandscapeRight => "rotate-0",
            RecordingOrientation::Portrait => "rotate-90",
            RecordingOrientation::LandscapeLeft => "rotate-180",
            RecordingOrientation::PortraitUpsideDown => "rotate-270",
        }
    }
}

/// Muxer configuration
pub struct MuxerConfig {
    /// Muxer element
    pub muxer: gst::Element,
    /// File sink element
    pub filesink: gst::Element,
    /// Output file path
    pub output_path: PathBuf,
}

/// Create muxer and filesink, tagging the container with the recording
/// orientation
pub fn create_muxer(
    muxer: gst::Element,
    output_path: PathBuf,
    orientation: RecordingOrientation,
) -> Result<MuxerConfig, EncodeError> {
    info!(path = %output_path.display(), ?orientation, "Creating muxer");

    let muxer_name = muxer
        .factory()
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Non-streamable output writes duration and indexes for seekable playback
    if muxer.has_property("streamable") {
        muxer.set_property("streamable", false);
        debug!(muxer = %muxer_name, "Configured muxer with streamable=false");
    }

    if let Some(tag_setter) = muxer.dynamic_cast_ref::<gst::TagSetter>() {
        tag_setter.add_tag::<gst::tags::ImageOrientation>(
            &orientation.tag_value(),
            gst::TagMergeMode::ReplaceAll,
        );
        debug!(tag = orientation.tag_value(), "Set container orientation tag");
    }

    let location = output_path
        .to_str()
        .ok_or_else(|| EncodeError::Io(format!("non-UTF8 output path {:?}", output_path)))?;
    let filesink = gst::ElementFactory::make("filesink")
        .property("location", location)
        .build()
        .map_err(|e| EncodeError::Failure(format!("create filesink: {}", e)))?;

    Ok(MuxerConfig {
        muxer,
        filesink,
        output_path,
    })
}

/// Link video encoder (or parser) to muxer
pub fn link_video_to_muxer(encoder: &gst::Element, muxer: &gst::Element) -> Result<(), EncodeError> {
    encoder
        .link(muxer)
        .map_err(|_| EncodeError::Failure("link video encoder to muxer".into()))?;
    debug!("Video encoder linked to muxer");
    Ok(())
}

/// Link muxer to filesink
pub fn link_muxer_to_sink(muxer: &gst::Element, filesink: &gst::Element) -> Result<(), EncodeError> {
    muxer
        .link(filesink)
        .map_err(|_| EncodeError::Failure("link muxer to filesink".into()))?;
    debug!("Muxer linked to filesink");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_degrees_round_trip() {
        for degrees in [0, 90, 180, 270] {
            let orientation = RecordingOrientation::from_degrees(degrees);
            assert_eq!(orientation.degrees(), degrees as u32);
        }
        assert_eq!(
            RecordingOrientation::from_degrees(450),
            RecordingOrientation::Portrait
        );
        assert_eq!(
            RecordingOrientation::from_degrees(-90),
            RecordingOrientation::PortraitUpsideDown
        );
    }

    #[test]
    fn orientation_tag_values() {
        assert_eq!(RecordingOrientation::LandscapeRight.tag_value(), "rotate-0");
        assert_eq!(RecordingOrientation::Portrait.tag_value(), "rotate-90");
    }
}
