// SPDX-License-Identifier: GPL-3.0-only

//! Logging setup for hosting processes
//!
//! The capture core only emits `tracing` events; where they go is the host's
//! decision. [`init`] installs a formatting subscriber honoring `RUST_LOG`
//! (e.g. `RUST_LOG=debug`, `RUST_LOG=canvas_camera=trace`), defaulting to
//! `warn`, for hosts and tests that have no subscriber of their own.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Repeated calls are harmless; only the first installation wins, so test
/// cases may all call this without coordinating.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .try_init();
}
