// SPDX-License-Identifier: GPL-3.0-only

//! Shared GPU processor infrastructure
//!
//! Common functionality for GPU compute work: dimension caching to avoid
//! reallocating output resources, async staging-buffer readback, and
//! dispatch-size math.

/// Dimensions the current output resources were allocated for
///
/// Capture sessions run at a fixed resolution, so in steady state every
/// frame hits the allocated-size fast path; only a session restart at a new
/// size pays for reallocation.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether resources sized for `self` fit a `width` x `height` frame
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// False until the first allocation
    pub fn is_initialized(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Async buffer readback (map, poll, read, unmap)
///
/// The common pattern for reading data back from a MAP_READ staging buffer
/// to CPU memory.
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, String> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    receiver
        .await
        .map_err(|_| "Failed to receive buffer mapping".to_string())?
        .map_err(|e| format!("Failed to map buffer: {:?}", e))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

/// Number of workgroups needed to cover `dimension` at `workgroup_size`
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size)
}

/// Bytes-per-row padded to wgpu's copy alignment (256)
#[inline]
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    (unpadded + 255) & !255
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_track_allocation_state() {
        let mut dims = CachedDimensions::default();
        assert!(!dims.is_initialized());
        assert!(dims.needs_update(352, 288));

        dims.update(352, 288);
        assert!(dims.is_initialized());
        assert!(!dims.needs_update(352, 288));
        // Any change in either dimension forces reallocation
        assert!(dims.needs_update(352, 240));
        assert!(dims.needs_update(640, 288));
    }

    #[test]
    fn dispatch_covers_partial_workgroups() {
        assert_eq!(compute_dispatch_size(352, 16), 22);
        assert_eq!(compute_dispatch_size(353, 16), 23);
        assert_eq!(compute_dispatch_size(1, 16), 1);
    }

    #[test]
    fn row_padding_aligns_to_copy_granularity() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        // 352 px RGBA rows land between alignment boundaries
        assert_eq!(padded_bytes_per_row(352 * 4), 1536);
        // 512 px RGBA rows are already aligned
        assert_eq!(padded_bytes_per_row(512 * 4), 2048);
    }
}
