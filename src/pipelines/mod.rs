// SPDX-License-Identifier: GPL-3.0-only

//! Output pipelines: per-frame processing, stills, and video recording

pub mod photo;
pub mod preview;
pub mod video;

pub use preview::{FramePipeline, PipelineShared};
