// SPDX-License-Identifier: GPL-3.0-only

//! Preview rendering: crop geometry and the locked render surface

pub mod surface;
pub mod viewport;

pub use surface::{RenderSurface, SharedSurface};
pub use viewport::{Size, ViewportRect, fit, fit_frame};
