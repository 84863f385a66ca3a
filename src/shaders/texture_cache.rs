// SPDX-License-Identifier: GPL-3.0-only

//! GPU texture cache keyed by capture-buffer identity
//!
//! Capture sources recycle a small pool of pixel buffers; binding plane
//! textures per pool slot lets every frame reuse its GPU allocation instead
//! of creating textures at framerate. Entries must be explicitly aged out
//! with [`TextureCache::flush`] once per delivery cycle; GPU resources are
//! never reclaimed implicitly.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::backends::camera::{PixelFormat, RawFrame};
use crate::constants::{TEXTURE_CACHE_MAX_ENTRIES, TEXTURE_CACHE_STALE_CYCLES};
use crate::errors::ConvertError;

/// Plane textures bound for one capture buffer
pub struct CacheEntry {
    /// Luma plane, R8Unorm, full resolution
    pub y_texture: Arc<wgpu::Texture>,
    /// Chroma plane, Rg8Unorm, half resolution in both dimensions
    pub chroma_texture: Arc<wgpu::Texture>,
    width: u32,
    height: u32,
    last_used: u64,
}

/// Texture pool mapping buffer identity to bound plane textures
pub struct TextureCache {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    entries: HashMap<u64, CacheEntry>,
    /// Monotonic delivery-cycle counter driving staleness eviction
    generation: u64,
    /// Scratch for interleaving I420 chroma planes before upload
    chroma_scratch: Vec<u8>,
}

impl TextureCache {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            entries: HashMap::new(),
            generation: 0,
            chroma_scratch: Vec::new(),
        }
    }

    /// Begin a delivery cycle; pairs with [`flush`] at the end of the cycle
    ///
    /// [`flush`]: TextureCache::flush
    pub fn begin_cycle(&mut self) {
        self.generation += 1;
    }

    /// Bind the frame's planes, reusing the entry for its buffer identity
    ///
    /// Uploads plane data into the (possibly pre-existing) textures and
    /// returns the entry. Fails with [`ConvertError::ResourceExhausted`]
    /// when the entry cap is reached rather than allocating further.
    pub fn bind(&mut self, frame: &RawFrame) -> Result<&CacheEntry, ConvertError> {
        let key = frame.buffer_id();

        let needs_create = match self.entries.get(&key) {
            Some(entry) => entry.width != frame.width || entry.height != frame.height,
            None => true,
        };

        if needs_create {
            if self.entries.len() >= TEXTURE_CACHE_MAX_ENTRIES
                && !self.entries.contains_key(&key)
            {
                return Err(ConvertError::ResourceExhausted(format!(
                    "texture cache at capacity ({} entries)",
                    TEXTURE_CACHE_MAX_ENTRIES
                )));
            }
            let entry = self.create_entry(frame)?;
            self.entries.insert(key, entry);
            debug!(
                buffer = format!("{:#x}", key),
                entries = self.entries.len(),
                "Allocated texture cache entry"
            );
        }

        self.upload_planes(key, frame)?;

        let generation = self.generation;
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or_else(|| ConvertError::ResourceExhausted("entry vanished".into()))?;
        entry.last_used = generation;
        Ok(&*entry)
    }

    fn create_entry(&self, frame: &RawFrame) -> Result<CacheEntry, ConvertError> {
        let y_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Y Plane"),
            size: wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let chroma_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Chroma Plane"),
            size: wgpu::Extent3d {
                width: frame.planes.uv_width,
                height: frame.planes.uv_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rg8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        Ok(CacheEntry {
            y_texture: Arc::new(y_texture),
            chroma_texture: Arc::new(chroma_texture),
            width: frame.width,
            height: frame.height,
            last_used: self.generation,
        })
    }

    fn upload_planes(&mut self, key: u64, frame: &RawFrame) -> Result<(), ConvertError> {
        let data: &[u8] = frame.data.as_ref();
        let planes = &frame.planes;

        let y_len = planes.y_stride as usize * frame.height as usize;
        let y_end = planes.y_offset + y_len;
        if data.len() < y_end {
            return Err(ConvertError::InvalidFrame(format!(
                "buffer {} bytes, luma plane needs {}",
                data.len(),
                y_end
            )));
        }

        let entry = self
            .entries
            .get(&key)
            .ok_or_else(|| ConvertError::ResourceExhausted("entry vanished".into()))?;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.y_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data[planes.y_offset..y_end],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(planes.y_stride),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );

        match frame.format {
            PixelFormat::Nv12 | PixelFormat::Nv21 => {
                let uv_len = planes.uv_stride as usize * planes.uv_height as usize;
                let uv_end = planes.uv_offset + uv_len;
                if data.len() < uv_end {
                    return Err(ConvertError::InvalidFrame(format!(
                        "buffer {} bytes, chroma plane needs {}",
                        data.len(),
                        uv_end
                    )));
                }
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &entry.chroma_texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &data[planes.uv_offset..uv_end],
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(planes.uv_stride),
                        rows_per_image: Some(planes.uv_height),
                    },
                    wgpu::Extent3d {
                        width: planes.uv_width,
                        height: planes.uv_height,
                        depth_or_array_layers: 1,
                    },
                );
            }
            PixelFormat::I420 => {
                // Interleave the separate U and V planes into the scratch
                // buffer so the chroma texture layout matches NV12
                let uv_w = planes.uv_width as usize;
                let uv_h = planes.uv_height as usize;
                let u_end = planes.uv_offset + planes.uv_stride as usize * uv_h;
                let v_end = planes.v_offset + planes.v_stride as usize * uv_h;
                if data.len() < u_end.max(v_end) {
                    return Err(ConvertError::InvalidFrame(format!(
                        "buffer {} bytes, chroma planes need {}",
                        data.len(),
                        u_end.max(v_end)
                    )));
                }

                self.chroma_scratch.resize(uv_w * uv_h * 2, 0);
                for row in 0..uv_h {
                    let u_row = planes.uv_offset + row * planes.uv_stride as usize;
                    let v_row = planes.v_offset + row * planes.v_stride as usize;
                    let out_row = row * uv_w * 2;
                    for col in 0..uv_w {
                        self.chroma_scratch[out_row + col * 2] = data[u_row + col];
                        self.chroma_scratch[out_row + col * 2 + 1] = data[v_row + col];
                    }
                }

                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &entry.chroma_texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &self.chroma_scratch,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(planes.uv_width * 2),
                        rows_per_image: Some(planes.uv_height),
                    },
                    wgpu::Extent3d {
                        width: planes.uv_width,
                        height: planes.uv_height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        Ok(())
    }

    /// Evict entries that have gone unused for long enough that their
    /// capture buffer pool must be gone
    ///
    /// Called once per delivery cycle. Eviction is deliberately lazier than
    /// one cycle: live pools rotate buffers, so an entry untouched for a
    /// single cycle is usually about to be reused.
    pub fn flush(&mut self) {
        let generation = self.generation;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| generation.saturating_sub(entry.last_used) < TEXTURE_CACHE_STALE_CYCLES);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            trace!(evicted, remaining = self.entries.len(), "Flushed stale texture cache entries");
        }
    }

    /// Drop every entry immediately (session restart, format change)
    pub fn invalidate(&mut self) {
        debug!(entries = self.entries.len(), "Invalidating texture cache");
        self.entries.clear();
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
