// SPDX-License-Identifier: GPL-3.0-only

//! Capture source backend
//!
//! Owns the physical camera session and the raw-frame delivery path.

pub mod controls;
pub mod enumeration;
pub mod frame_loop;
pub mod session;
pub mod types;

pub use frame_loop::{CaptureLoopController, DeliverySlot, LoopAction};
pub use session::CameraSession;
pub use types::{CameraDevice, CameraResult, FrameData, Framerate, PixelFormat, RawFrame, YuvPlanes};
