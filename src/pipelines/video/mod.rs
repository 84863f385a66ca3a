// SPDX-License-Identifier: GPL-3.0-only

//! Video recording pipeline

pub mod muxer;
pub mod recorder;

pub use muxer::RecordingOrientation;
pub use recorder::VideoRecorder;
