// SPDX-License-Identifier: GPL-3.0-only

//! GPU re-rendering of textured depth meshes
//!
//! A wgpu render pipeline rasterizes the uploaded mesh into three color
//! attachments (color, metric depth, mask) plus a depth attachment, then
//! copies all three back through padded staging buffers.

mod framebuffer;
mod processor;

use crate::gpu::wgpu;

pub use framebuffer::GpuFramebuffer;
pub use processor::GpuSurface;

/// Vertex + fragment program
pub const RERENDER_WGSL: &str = include_str!("rerender.wgsl");

/// Color attachment formats, in `@location` order
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const METRIC_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
