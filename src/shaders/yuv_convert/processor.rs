// SPDX-License-Identifier: GPL-3.0-only

//! GPU-accelerated YUV to RGBA conversion
//!
//! Compute-shader conversion of planar 4:2:0 frames to RGBA. The output
//! stays on GPU as a texture; CPU readback is opt-in and only paid when an
//! encoder or preview payload needs the pixels. This is the per-frame hot
//! path and must finish inside the capture frame budget.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::super::gpu_processor::{
    CachedDimensions, compute_dispatch_size, padded_bytes_per_row, read_buffer_async,
};
use super::super::texture_cache::TextureCache;
use crate::backends::camera::RawFrame;
use crate::errors::ConvertError;
use crate::gpu;

/// Uniform buffer for shader parameters
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ConvertParams {
    width: u32,
    height: u32,
    format: u32,
    _pad: u32,
}

/// A GPU-resident, color-converted frame
///
/// Immutable once produced. Shared by the render surface and the output
/// encoder for the duration of one frame cycle; producing the next frame
/// supersedes it.
#[derive(Clone)]
pub struct ConvertedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA texture for zero-copy GPU consumers
    pub texture: Option<Arc<wgpu::Texture>>,
    /// RGBA bytes, present when the frame was converted with readback
    pub rgba: Option<Arc<Vec<u8>>>,
    /// Presentation timestamp carried over from the raw frame
    pub pts_ns: Option<u64>,
    pub captured_at: Instant,
}

impl std::fmt::Debug for ConvertedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvertedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba", &self.rgba.as_ref().map(|d| d.len()))
            .field("pts_ns", &self.pts_ns)
            .finish()
    }
}

/// GPU processor converting raw frames to RGBA
pub struct FrameConverter {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    // Cached output resources, reused while dimensions are stable
    cached_dims: CachedDimensions,
    uniform_buffer: Option<wgpu::Buffer>,
    output_texture: Option<Arc<wgpu::Texture>>,
    staging_buffer: Option<wgpu::Buffer>,
}

impl FrameConverter {
    /// Create a converter with its own compute device
    pub async fn new() -> Result<Self, ConvertError> {
        let (device, queue, info) = gpu::create_compute_device("YUV Convert")
            .await
            .map_err(ConvertError::ContextLost)?;

        info!(
            adapter_name = %info.adapter_name,
            backend = ?info.backend,
            "GPU device created for YUV conversion"
        );

        let shader_source = include_str!("yuv_to_rgba.wgsl");
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("YUV to RGBA Shader"),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("YUV Convert Bind Group Layout"),
            entries: &[
                // Params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Luma plane
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Chroma plane
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Output RGBA texture
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("YUV Convert Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("YUV to RGBA Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            cached_dims: CachedDimensions::default(),
            uniform_buffer: None,
            output_texture: None,
            staging_buffer: None,
        })
    }

    /// Build a texture cache sharing this converter's device and queue
    pub fn create_texture_cache(&self) -> TextureCache {
        TextureCache::new(Arc::clone(&self.device), Arc::clone(&self.queue))
    }

    /// Ensure output resources are allocated for the given dimensions
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if !self.cached_dims.needs_update(width, height) {
            return;
        }

        debug!(width, height, "Allocating YUV convert output resources");

        self.uniform_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("YUV Params Buffer"),
            size: std::mem::size_of::<ConvertParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("RGBA Output Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        self.output_texture = Some(Arc::new(texture));

        // Staging rows are padded to the copy alignment and stripped on read
        let staging_size = padded_bytes_per_row(width * 4) as u64 * height as u64;
        self.staging_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("RGBA Staging Buffer"),
            size: staging_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }));

        self.cached_dims.update(width, height);
    }

    /// Convert one raw frame to RGBA on the GPU
    ///
    /// Plane textures come from `cache` keyed by the frame's buffer
    /// identity. With `read_back` the RGBA bytes are copied out through the
    /// staging buffer; otherwise the result is texture-only.
    pub async fn convert(
        &mut self,
        frame: &RawFrame,
        cache: &mut TextureCache,
        read_back: bool,
    ) -> Result<ConvertedImage, ConvertError> {
        if frame.data.len() < frame.expected_len() {
            return Err(ConvertError::InvalidFrame(format!(
                "frame {} bytes, {}x{} {:?} needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.format,
                frame.expected_len()
            )));
        }

        self.ensure_resources(frame.width, frame.height);

        // Bind and upload the source planes through the cache
        let (y_view, chroma_view) = {
            let entry = cache.bind(frame)?;
            (
                entry
                    .y_texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
                entry
                    .chroma_texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
            )
        };

        let uniform_buffer = self
            .uniform_buffer
            .as_ref()
            .ok_or_else(|| ConvertError::ContextLost("uniform buffer missing".into()))?;
        let output_texture = self
            .output_texture
            .as_ref()
            .ok_or_else(|| ConvertError::ContextLost("output texture missing".into()))?;

        let params = ConvertParams {
            width: frame.width,
            height: frame.height,
            format: frame.format.gpu_format_code(),
            _pad: 0,
        };
        self.queue
            .write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&params));

        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("YUV Convert Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&y_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&chroma_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("YUV Convert Encoder"),
            });

        let workgroups_x = compute_dispatch_size(frame.width, 16);
        let workgroups_y = compute_dispatch_size(frame.height, 16);

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("YUV to RGBA Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
        }

        if read_back {
            let staging_buffer = self
                .staging_buffer
                .as_ref()
                .ok_or_else(|| ConvertError::ContextLost("staging buffer missing".into()))?;
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: output_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: staging_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_bytes_per_row(frame.width * 4)),
                        rows_per_image: Some(frame.height),
                    },
                },
                wgpu::Extent3d {
                    width: frame.width,
                    height: frame.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        let rgba = if read_back {
            let staging_buffer = self
                .staging_buffer
                .as_ref()
                .ok_or_else(|| ConvertError::ContextLost("staging buffer missing".into()))?;
            let padded = read_buffer_async(&self.device, staging_buffer)
                .await
                .map_err(ConvertError::ContextLost)?;
            Some(Arc::new(strip_row_padding(
                &padded,
                frame.width,
                frame.height,
            )))
        } else {
            None
        };

        Ok(ConvertedImage {
            width: frame.width,
            height: frame.height,
            texture: Some(Arc::clone(output_texture)),
            rgba,
            pts_ns: frame.pts_ns,
            captured_at: frame.captured_at,
        })
    }
}

/// Remove the 256-byte copy alignment padding from staging rows
fn strip_row_padding(padded: &[u8], width: u32, height: u32) -> Vec<u8> {
    let row_bytes = (width * 4) as usize;
    let padded_row = padded_bytes_per_row(width * 4) as usize;

    if row_bytes == padded_row {
        return padded[..row_bytes * height as usize].to_vec();
    }

    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * padded_row;
        out.extend_from_slice(&padded[start..start + row_bytes]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_padding_no_op_for_aligned_width() {
        // 64 px * 4 bytes = 256, already aligned
        let padded = vec![7u8; 256 * 2];
        let out = strip_row_padding(&padded, 64, 2);
        assert_eq!(out.len(), 256 * 2);
    }

    #[test]
    fn strip_padding_removes_tail_of_each_row() {
        // 10 px * 4 = 40 bytes, padded to 256
        let mut padded = vec![0u8; 256 * 2];
        for row in 0..2 {
            for b in 0..40 {
                padded[row * 256 + b] = 1;
            }
        }
        let out = strip_row_padding(&padded, 10, 2);
        assert_eq!(out.len(), 80);
        assert!(out.iter().all(|&b| b == 1));
    }
}
