// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Default capture width in pixels when the start options omit one
pub const DEFAULT_CAPTURE_WIDTH: u32 = 352;

/// Default capture height in pixels when the start options omit one
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 288;

/// Default capture framerate
pub const DEFAULT_FPS: u32 = 30;

/// Default thumbnail edge ratio relative to the fullsize output
pub const DEFAULT_THUMBNAIL_RATIO: f64 = 1.0 / 6.0;

/// Consecutive per-frame conversion/draw failures tolerated before a single
/// escalated error event is emitted (~1s of frames at the default framerate)
pub const MAX_CONSECUTIVE_FRAME_FAILURES: u32 = 30;

/// Hard cap on live texture-cache entries; exceeding it is treated as
/// resource exhaustion rather than growing GPU memory without bound
pub const TEXTURE_CACHE_MAX_ENTRIES: usize = 8;

/// Delivery cycles a texture-cache entry may go unused before `flush()`
/// evicts it. Capture buffer pools cycle a handful of buffers, so an entry
/// idle this long belongs to a torn-down pool.
pub const TEXTURE_CACHE_STALE_CYCLES: u64 = 30;

/// Number of preview files cycled per session in `file` output mode.
/// Keeps per-frame file output bounded while letting the web view finish
/// loading the previous frame before its file is overwritten.
pub const PREVIEW_FILE_RING: u64 = 10;

/// Appsink buffer bound; frames beyond this are dropped at the source
pub const APPSINK_MAX_BUFFERS: u32 = 2;

/// JPEG quality used for fullsize preview and still output
pub const JPEG_QUALITY_FULLSIZE: u8 = 92;

/// JPEG quality used for thumbnail output
pub const JPEG_QUALITY_THUMBNAIL: u8 = 80;

/// Recording bitrate presets (kbit/s) for the video encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitratePreset {
    /// Smaller files, visible compression artifacts
    Low,
    /// Balanced default
    #[default]
    Medium,
    /// Larger files, near-transparent quality
    High,
}

impl BitratePreset {
    /// Bitrate in kbit/s for a given output resolution
    pub fn kbps(&self, width: u32, height: u32) -> u32 {
        // Scale from a 1080p baseline by pixel count
        let pixels = (width * height) as f64;
        let baseline = pixels / (1920.0 * 1080.0);
        let base = match self {
            BitratePreset::Low => 4_000.0,
            BitratePreset::Medium => 8_000.0,
            BitratePreset::High => 16_000.0,
        };
        (base * baseline).clamp(500.0, 50_000.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_scales_with_resolution() {
        let at_1080 = BitratePreset::Medium.kbps(1920, 1080);
        let at_720 = BitratePreset::Medium.kbps(1280, 720);
        assert!(at_720 < at_1080);
        assert_eq!(at_1080, 8_000);
    }

    #[test]
    fn bitrate_clamped_for_tiny_frames() {
        assert_eq!(BitratePreset::Low.kbps(16, 16), 500);
    }
}
