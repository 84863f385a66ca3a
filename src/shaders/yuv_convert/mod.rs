// SPDX-License-Identifier: GPL-3.0-only

//! GPU YUV to RGBA conversion pipeline

mod processor;

pub use processor::{ConvertedImage, FrameConverter};

/// WGSL source of the conversion shader, exposed for validation in tests
pub const YUV_TO_RGBA_SHADER: &str = include_str!("yuv_to_rgba.wgsl");
