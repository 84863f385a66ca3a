// SPDX-License-Identifier: GPL-3.0-only

//! GPU compute pipeline for frame conversion
//!
//! The conversion shader and its supporting infrastructure: output-resource
//! caching, staging readback, and the buffer-identity texture cache.

mod gpu_processor;
pub mod texture_cache;
pub mod yuv_convert;

pub use gpu_processor::{
    CachedDimensions, compute_dispatch_size, padded_bytes_per_row, read_buffer_async,
};
pub use texture_cache::TextureCache;
pub use yuv_convert::{ConvertedImage, FrameConverter, YUV_TO_RGBA_SHADER};
