// SPDX-License-Identifier: GPL-3.0-only

//! canvas-camera - capture core bridging a native camera pipeline to a web
//! canvas surface
//!
//! This library implements the frame pipeline behind a hybrid-container
//! camera plugin: capturing raw sensor frames, converting them to RGBA on
//! the GPU, cropping to the canvas geometry, and handing encoded stills,
//! per-frame previews and video recordings back across the plugin boundary.
//!
//! # Architecture
//!
//! - [`backends`]: camera device session, controls, and frame delivery
//! - [`shaders`]: GPU YUV conversion and the buffer-identity texture cache
//! - [`render`]: crop geometry and the locked render surface
//! - [`pipelines`]: per-frame processing, still encoding, video recording
//! - [`controller`]: the command surface the host façade dispatches into
//! - [`config`] / [`events`]: the incoming options and outgoing payloads
//!   crossing the plugin boundary

pub mod backends;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod events;
pub mod flash;
pub mod gpu;
pub mod logging;
pub mod pipelines;
pub mod render;
pub mod shaders;
pub mod storage;

// Re-export commonly used types
pub use config::{CaptureOptions, FocusMode, LensFacing, UseMode};
pub use controller::CameraController;
pub use errors::{AppError, AppResult, ErrorKind};
pub use events::{EventReceiver, EventSender, PluginEvent};
pub use render::{Size, ViewportRect, fit};
