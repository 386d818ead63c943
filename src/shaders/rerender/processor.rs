// SPDX-License-Identifier: GPL-3.0-only

//! GPU raster surface
//!
//! Owns the [`GpuContext`], the render pipeline, the uploaded mesh and texture
//! and a framebuffer that is only reallocated when the target size changes.

use super::{
    COLOR_FORMAT, DEPTH_FORMAT, GpuFramebuffer, MASK_FORMAT, METRIC_DEPTH_FORMAT, RERENDER_WGSL,
};
use crate::errors::{AppError, AppResult};
use crate::geometry::{Intrinsics, projection_matrix};
use crate::gpu::{GpuContext, wgpu};
use crate::mesh::{Mesh, Vertex};
use crate::render::{RasterSurface, RenderOutput, validate_render_request};
use image::RgbImage;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

/// Projection uniform (column-major 4x4)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    projection: [f32; 16],
}

struct UploadedMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct UploadedTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// wgpu implementation of [`RasterSurface`]
pub struct GpuSurface {
    context: GpuContext,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    mesh: Option<UploadedMesh>,
    texture: Option<UploadedTexture>,
    framebuffer: Option<GpuFramebuffer>,
    generation: u64,
}

impl GpuSurface {
    /// Compile the program and build the pipeline on `context`
    ///
    /// Shader or pipeline validation errors come back as `ResourceCreation`
    /// with the driver diagnostic.
    pub fn new(context: GpuContext) -> AppResult<Self> {
        info!(device = %context.describe(), "Initializing GPU raster surface");
        let device = context.device().clone();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("rerender_shader"),
            source: wgpu::ShaderSource::Wgsl(RERENDER_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rerender_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rerender_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let color_target = |format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rerender_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[
                    color_target(COLOR_FORMAT),
                    color_target(METRIC_DEPTH_FORMAT),
                    color_target(MASK_FORMAT),
                ],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(AppError::ResourceCreation(format!(
                "render program creation failed: {}",
                err
            )));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rerender_uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("rerender_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            context,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler,
            mesh: None,
            texture: None,
            framebuffer: None,
            generation: 0,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Release the surface and its context
    pub fn destroy(self) {
        let Self { context, .. } = self;
        context.destroy();
    }

    fn ensure_framebuffer(&mut self, width: u32, height: u32) -> AppResult<()> {
        let current = self.framebuffer.as_ref().map(|fb| fb.dims());
        if current.is_some_and(|dims| !dims.needs_update(width, height)) {
            return Ok(());
        }
        // Release the old attachments before allocating new ones
        self.framebuffer = None;
        self.framebuffer = Some(GpuFramebuffer::create(self.context.device(), width, height)?);
        self.generation += 1;
        Ok(())
    }
}

/// Reject a buffer larger than the device allows before wgpu sees it
fn check_buffer_size(kind: &str, bytes: usize, max_size: u64) -> AppResult<()> {
    if bytes as u64 > max_size {
        return Err(AppError::input(format!(
            "mesh {} buffer of {} bytes exceeds the device limit of {} bytes",
            kind, bytes, max_size
        )));
    }
    Ok(())
}

impl RasterSurface for GpuSurface {
    fn upload_mesh(&mut self, mesh: &Mesh) -> AppResult<()> {
        if mesh.is_empty() {
            return Err(AppError::input("cannot upload an empty mesh"));
        }
        let vertex_count = mesh.num_vertices() as u32;
        if mesh.index_data().iter().any(|&i| i >= vertex_count) {
            return Err(AppError::input("mesh index out of range"));
        }

        let device = self.context.device();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(mesh.index_data());
        let max_size = device.limits().max_buffer_size;
        check_buffer_size("vertex", vertex_bytes.len(), max_size)?;
        check_buffer_size("index", index_bytes.len(), max_size)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rerender_vertices"),
            contents: vertex_bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("rerender_indices"),
            contents: index_bytes,
            usage: wgpu::BufferUsages::INDEX,
        });

        let out_of_memory = pollster::block_on(device.pop_error_scope());
        let validation = pollster::block_on(device.pop_error_scope());
        if let Some(err) = out_of_memory.or(validation) {
            return Err(AppError::ResourceCreation(format!(
                "mesh upload failed ({} vertices, {} triangles): {}",
                mesh.num_vertices(),
                mesh.num_triangles(),
                err
            )));
        }

        self.mesh = Some(UploadedMesh {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_data().len() as u32,
        });
        debug!(
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            "Mesh uploaded to GPU"
        );
        Ok(())
    }

    fn upload_texture(&mut self, texture: &RgbImage) -> AppResult<()> {
        let (width, height) = texture.dimensions();
        if width == 0 || height == 0 {
            return Err(AppError::input("cannot upload an empty texture"));
        }

        let device = self.context.device();
        let max = device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(AppError::input(format!(
                "texture {}x{} exceeds the device limit of {}",
                width, height, max
            )));
        }

        // No 3-channel 8-bit texture format; expand to RGBA
        let rgba: Vec<u8> = texture
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2], 255])
            .collect();

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let gpu_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("rerender_source_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rerender_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.texture = Some(UploadedTexture {
            _texture: gpu_texture,
            bind_group,
        });
        debug!(width, height, "Texture uploaded to GPU");
        Ok(())
    }

    fn render(
        &mut self,
        source: &Intrinsics,
        target: &Intrinsics,
        near: f32,
        far: f32,
    ) -> AppResult<RenderOutput> {
        validate_render_request(target, near, far, self.mesh.is_some(), self.texture.is_some())?;
        self.ensure_framebuffer(target.width, target.height)?;

        let (Some(mesh), Some(texture), Some(framebuffer)) =
            (&self.mesh, &self.texture, &self.framebuffer)
        else {
            return Err(AppError::render("GPU surface is not ready"));
        };

        debug!(
            zoom = target.fx / source.fx,
            width = target.width,
            height = target.height,
            "GPU render"
        );

        let device = self.context.device();
        let queue = self.context.queue();

        let uniforms = Uniforms {
            projection: projection_matrix(target, near, far).to_cols_array(),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("rerender_encoder"),
        });

        {
            let color_attachments = framebuffer.color_attachments();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rerender_pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(framebuffer.depth_attachment()),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&texture.bind_group), &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }

        framebuffer.encode_readback(&mut encoder);
        queue.submit(std::iter::once(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(AppError::render(format!("GPU render failed: {}", err)));
        }

        pollster::block_on(framebuffer.read(device))
    }

    fn describe(&self) -> String {
        format!("wgpu rasterizer on {}", self.context.describe())
    }

    fn target_generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_limit() {
        let downlevel = wgpu::Limits::downlevel_defaults().max_buffer_size;
        assert!(check_buffer_size("index", 1024, downlevel).is_ok());
        assert!(check_buffer_size("index", downlevel as usize, downlevel).is_ok());

        // 4032x3024 grid, two triangles per quad, three u32 indices each
        let index_bytes = 2 * 4031 * 3023 * 3 * 4;
        let err = check_buffer_size("index", index_bytes, downlevel).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }
}
