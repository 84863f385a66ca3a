// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture source

use gstreamer::buffer::{MappedBuffer, Readable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::LensFacing;

/// Frame data storage - either pre-copied bytes or a zero-copy mapped
/// GStreamer buffer
///
/// The `Mapped` variant keeps the capture buffer mapped and alive until all
/// references are dropped; no pixel data is copied on the delivery path.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (tests, synthetic sources)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// Planar YUV pixel format of a delivered frame
///
/// All variants are 4:2:0 subsampled; the chroma plane(s) cover half the
/// luma resolution in both dimensions. Conversion to RGBA happens on the
/// GPU before any downstream consumer sees the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Y plane followed by one interleaved UV plane
    Nv12,
    /// Like NV12 with V and U swapped
    Nv21,
    /// Y plane followed by separate U and V planes
    I420,
}

impl PixelFormat {
    /// Format code handed to the conversion shader (0 = chroma is (U,V),
    /// 1 = chroma is (V,U))
    pub fn gpu_format_code(&self) -> u32 {
        match self {
            PixelFormat::Nv12 | PixelFormat::I420 => 0,
            PixelFormat::Nv21 => 1,
        }
    }

    /// Average bytes per pixel accounting for chroma subsampling
    pub fn bytes_per_pixel(&self) -> f32 {
        1.5
    }

    /// GStreamer video/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            PixelFormat::Nv12 => "NV12",
            PixelFormat::Nv21 => "NV21",
            PixelFormat::I420 => "I420",
        }
    }

    /// Parse from a GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "NV12" => Some(PixelFormat::Nv12),
            "NV21" => Some(PixelFormat::Nv21),
            "I420" | "YV12" => Some(PixelFormat::I420),
            _ => None,
        }
    }
}

/// Plane offsets and strides for a planar YUV buffer
///
/// Planes live at different offsets within one contiguous buffer; these
/// values let the GPU upload extract each plane without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YuvPlanes {
    /// Y plane offset in bytes from start of buffer
    pub y_offset: usize,
    /// Y plane stride in bytes
    pub y_stride: u32,
    /// Chroma plane offset (NV12/NV21: interleaved UV; I420: U plane)
    pub uv_offset: usize,
    /// Chroma plane stride in bytes
    pub uv_stride: u32,
    /// V plane offset (I420 only, 0 otherwise)
    pub v_offset: usize,
    /// V plane stride (I420 only, 0 otherwise)
    pub v_stride: u32,
    /// Chroma plane width in pixels
    pub uv_width: u32,
    /// Chroma plane height in pixels
    pub uv_height: u32,
}

impl YuvPlanes {
    /// Tightly-packed plane layout for a frame with no row padding
    pub fn packed(format: PixelFormat, width: u32, height: u32) -> Self {
        let y_size = (width * height) as usize;
        let uv_width = width / 2;
        let uv_height = height / 2;
        match format {
            PixelFormat::Nv12 | PixelFormat::Nv21 => Self {
                y_offset: 0,
                y_stride: width,
                uv_offset: y_size,
                uv_stride: width,
                v_offset: 0,
                v_stride: 0,
                uv_width,
                uv_height,
            },
            PixelFormat::I420 => {
                let u_size = (uv_width * uv_height) as usize;
                Self {
                    y_offset: 0,
                    y_stride: width,
                    uv_offset: y_size,
                    uv_stride: uv_width,
                    v_offset: y_size + u_size,
                    v_stride: uv_width,
                    uv_width,
                    uv_height,
                }
            }
        }
    }
}

/// A single raw frame delivered by the capture source
///
/// Valid only until the capture session is restarted or torn down; the
/// converter must not hold a reference across deliveries unless the frame
/// was explicitly retained via [`RawFrame::to_copied`].
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// Entire buffer, all planes contiguous
    pub data: FrameData,
    pub format: PixelFormat,
    pub planes: YuvPlanes,
    /// Presentation timestamp in nanoseconds, if the source provided one
    pub pts_ns: Option<u64>,
    /// Wall-clock delivery time (latency diagnostics)
    pub captured_at: Instant,
}

impl RawFrame {
    /// Stable identity of the underlying pixel buffer
    ///
    /// Capture sources recycle a small pool of buffers; the mapped data
    /// pointer identifies the pool slot and keys the GPU texture cache.
    pub fn buffer_id(&self) -> u64 {
        self.data.as_ref().as_ptr() as u64
    }

    /// Expected minimum buffer length for the declared format/dimensions
    pub fn expected_len(&self) -> usize {
        (self.width as f32 * self.height as f32 * self.format.bytes_per_pixel()) as usize
    }

    /// Convert to a frame with copied data, safe to hold past the next
    /// delivery or session teardown
    pub fn to_copied(&self) -> Self {
        let copied_data = match &self.data {
            FrameData::Copied(data) => FrameData::Copied(Arc::clone(data)),
            FrameData::Mapped(buffer) => {
                let slice: &[u8] = buffer.as_ref();
                FrameData::Copied(Arc::from(slice))
            }
        };

        Self {
            data: copied_data,
            ..self.clone()
        }
    }
}

/// Exact framerate as a fraction (handles NTSC rates like 30000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Frame duration in nanoseconds
    pub fn frame_duration_ns(&self) -> u64 {
        if self.num == 0 {
            return 0;
        }
        (1_000_000_000u64 * self.denom as u64) / self.num as u64
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// A camera device discovered on the system
#[derive(Debug, Clone)]
pub struct CameraDevice {
    /// Capture device node, e.g. /dev/video0
    pub path: String,
    /// Human-readable device name (V4L2 card)
    pub card: String,
    /// Kernel driver name
    pub driver: String,
    /// Which way the sensor faces, when the platform reports it
    pub facing: Option<LensFacing>,
}

/// Result type for capture-source operations
pub type CameraResult<T> = Result<T, crate::errors::CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn copied_frame(format: PixelFormat, width: u32, height: u32) -> RawFrame {
        let len = (width as f32 * height as f32 * format.bytes_per_pixel()) as usize;
        RawFrame {
            width,
            height,
            data: FrameData::Copied(Arc::from(vec![0u8; len])),
            format,
            planes: YuvPlanes::packed(format, width, height),
            pts_ns: Some(0),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn packed_nv12_layout() {
        let planes = YuvPlanes::packed(PixelFormat::Nv12, 640, 480);
        assert_eq!(planes.y_offset, 0);
        assert_eq!(planes.uv_offset, 640 * 480);
        assert_eq!(planes.uv_stride, 640);
        assert_eq!((planes.uv_width, planes.uv_height), (320, 240));
    }

    #[test]
    fn packed_i420_layout() {
        let planes = YuvPlanes::packed(PixelFormat::I420, 640, 480);
        assert_eq!(planes.uv_offset, 640 * 480);
        assert_eq!(planes.v_offset, 640 * 480 + 320 * 240);
        assert_eq!(planes.v_stride, 320);
    }

    #[test]
    fn buffer_id_stable_across_clones() {
        let frame = copied_frame(PixelFormat::Nv12, 64, 64);
        let clone = frame.clone();
        assert_eq!(frame.buffer_id(), clone.buffer_id());
    }

    #[test]
    fn copied_frame_detaches_identity() {
        let frame = copied_frame(PixelFormat::Nv12, 64, 64);
        let copy = frame.to_copied();
        // Copied variant shares the same Arc, so identity is preserved
        assert_eq!(frame.buffer_id(), copy.buffer_id());
        assert_eq!(copy.expected_len(), 64 * 64 * 3 / 2);
    }

    #[test]
    fn gst_format_round_trip() {
        for format in [PixelFormat::Nv12, PixelFormat::Nv21, PixelFormat::I420] {
            assert_eq!(
                PixelFormat::from_gst_format(format.to_gst_format_string()),
                Some(format)
            );
        }
        assert_eq!(PixelFormat::from_gst_format("RGBA"), None);
    }
}
