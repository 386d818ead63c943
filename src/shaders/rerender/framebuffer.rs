// SPDX-License-Identifier: GPL-3.0-only

//! Multi-render-target framebuffer with padded readback buffers

use super::{COLOR_FORMAT, DEPTH_FORMAT, MASK_FORMAT, METRIC_DEPTH_FORMAT};
use crate::errors::{AppError, AppResult};
use crate::gpu::wgpu;
use crate::render::{CachedDimensions, RasterOrigin, RenderOutput, assemble_output};
use crate::shaders::gpu_processor::{bytes_to_f32, padded_bytes_per_row, read_buffer_async, unpad_rows};
use tracing::debug;

/// One color attachment and the staging buffer it is copied into
struct Attachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    staging: wgpu::Buffer,
    bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl Attachment {
    fn new(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        bytes_per_pixel: u32,
        size: wgpu::Extent3d,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row = size.width * bytes_per_pixel;
        let padded = padded_bytes_per_row(bytes_per_row);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}_staging", label)),
            size: padded as u64 * size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            texture,
            view,
            staging,
            bytes_per_row,
            padded_bytes_per_row: padded,
        }
    }

    fn color_attachment(&self) -> Option<wgpu::RenderPassColorAttachment<'_>> {
        Some(wgpu::RenderPassColorAttachment {
            view: &self.view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })
    }

    fn encode_copy(&self, encoder: &mut wgpu::CommandEncoder, size: wgpu::Extent3d) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );
    }

    async fn read(&self, device: &wgpu::Device, height: u32) -> AppResult<Vec<u8>> {
        let data = read_buffer_async(device, &self.staging).await?;
        Ok(unpad_rows(&data, self.bytes_per_row, self.padded_bytes_per_row, height))
    }
}

/// Color, metric-depth and mask targets plus the depth-test attachment
pub struct GpuFramebuffer {
    dims: CachedDimensions,
    color: Attachment,
    metric_depth: Attachment,
    mask: Attachment,
    _depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl GpuFramebuffer {
    /// Allocate all attachments for a `width x height` target
    ///
    /// Allocation runs inside validation and out-of-memory error scopes; an
    /// incomplete framebuffer is reported as `ResourceCreation`.
    pub fn create(device: &wgpu::Device, width: u32, height: u32) -> AppResult<Self> {
        let max = device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(AppError::render(format!(
                "target {}x{} exceeds the device limit of {}",
                width, height, max
            )));
        }

        debug!(width, height, "Allocating GPU framebuffer");

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let color = Attachment::new(device, "rerender_color", COLOR_FORMAT, 4, size);
        let metric_depth =
            Attachment::new(device, "rerender_metric_depth", METRIC_DEPTH_FORMAT, 4, size);
        let mask = Attachment::new(device, "rerender_mask", MASK_FORMAT, 1, size);

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rerender_depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let out_of_memory = pollster::block_on(device.pop_error_scope());
        let validation = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            return Err(AppError::ResourceCreation(format!(
                "framebuffer incomplete ({}x{}): {}",
                width, height, err
            )));
        }

        Ok(Self {
            dims: CachedDimensions::new(width, height),
            color,
            metric_depth,
            mask,
            _depth_texture: depth_texture,
            depth_view,
        })
    }

    pub fn dims(&self) -> CachedDimensions {
        self.dims
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.dims.width,
            height: self.dims.height,
            depth_or_array_layers: 1,
        }
    }

    /// Attachments in `@location` order, all cleared to zero on load
    pub fn color_attachments(&self) -> [Option<wgpu::RenderPassColorAttachment<'_>>; 3] {
        [
            self.color.color_attachment(),
            self.metric_depth.color_attachment(),
            self.mask.color_attachment(),
        ]
    }

    /// Depth-test attachment cleared to the far plane
    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Discard,
            }),
            stencil_ops: None,
        }
    }

    /// Record copies of all three outputs into their staging buffers
    pub fn encode_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        let size = self.extent();
        self.color.encode_copy(encoder, size);
        self.metric_depth.encode_copy(encoder, size);
        self.mask.encode_copy(encoder, size);
    }

    /// Map the staging buffers and assemble a top-left-origin output
    pub async fn read(&self, device: &wgpu::Device) -> AppResult<RenderOutput> {
        let height = self.dims.height;
        let color = self.color.read(device, height).await?;
        let metric_depth = bytes_to_f32(&self.metric_depth.read(device, height).await?);
        let mask = self.mask.read(device, height).await?;

        assemble_output(
            self.dims.width,
            height,
            RasterOrigin::TopLeft,
            &color,
            &metric_depth,
            &mask,
        )
    }
}
