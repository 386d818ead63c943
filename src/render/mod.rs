// SPDX-License-Identifier: GPL-3.0-only

//! Rasterization surfaces
//!
//! A [`RasterSurface`] owns one uploaded mesh, one uploaded texture and a
//! framebuffer sized to the most recent target. Renders are serialized by
//! `&mut self`; uploads stay valid across renders until replaced.

pub mod contract;
pub mod output;
pub mod software;

pub use output::{RasterOrigin, RenderOutput, assemble_output};
pub use software::SoftwareSurface;

use crate::errors::{AppError, AppResult};
use crate::geometry::Intrinsics;
use crate::gpu::GpuContext;
use crate::mesh::Mesh;
use crate::shaders::rerender::GpuSurface;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Common interface of the software and GPU rasterizers
pub trait RasterSurface {
    /// Replace the uploaded mesh
    fn upload_mesh(&mut self, mesh: &Mesh) -> AppResult<()>;

    /// Replace the uploaded color texture
    fn upload_texture(&mut self, texture: &RgbImage) -> AppResult<()>;

    /// Render the uploaded mesh as seen by `target` and read back all outputs
    ///
    /// The framebuffer is resized to `target.width x target.height` only when
    /// that differs from the current allocation.
    fn render(
        &mut self,
        source: &Intrinsics,
        target: &Intrinsics,
        near: f32,
        far: f32,
    ) -> AppResult<RenderOutput>;

    /// Human-readable surface description for logs
    fn describe(&self) -> String;

    /// Number of framebuffer allocations performed so far
    fn target_generation(&self) -> u64;
}

/// Which rasterizer to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GPU when an adapter is available, software otherwise
    #[default]
    Auto,
    Gpu,
    Software,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Auto => write!(f, "auto"),
            Backend::Gpu => write!(f, "gpu"),
            Backend::Software => write!(f, "software"),
        }
    }
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "gpu" | "wgpu" => Ok(Backend::Gpu),
            "software" | "cpu" => Ok(Backend::Software),
            other => Err(AppError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Create a surface for the requested backend
///
/// `Auto` falls back to the software rasterizer when GPU initialization
/// fails; an explicit `Gpu` request propagates the failure.
pub fn create_surface(
    backend: Backend,
    device_index: Option<usize>,
) -> AppResult<Box<dyn RasterSurface>> {
    let surface: Box<dyn RasterSurface> = match backend {
        Backend::Software => Box::new(SoftwareSurface::new()),
        Backend::Gpu => {
            let context = GpuContext::initialize(device_index)?;
            Box::new(GpuSurface::new(context)?)
        }
        Backend::Auto => match GpuContext::initialize(device_index) {
            Ok(context) => Box::new(GpuSurface::new(context)?),
            Err(e) => {
                warn!(error = %e, "GPU unavailable, using software rasterizer");
                Box::new(SoftwareSurface::new())
            }
        },
    };
    info!(surface = %surface.describe(), "Raster surface ready");
    Ok(surface)
}

/// Framebuffer size currently allocated by a surface
///
/// Surfaces compare against this before reallocating so that repeated renders
/// at one resolution reuse the same attachments.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Check if dimensions have changed and need update
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }
}

/// Checks shared by every surface before a render touches the framebuffer
pub(crate) fn validate_render_request(
    target: &Intrinsics,
    near: f32,
    far: f32,
    has_mesh: bool,
    has_texture: bool,
) -> AppResult<()> {
    if !has_mesh {
        return Err(AppError::input("no mesh uploaded"));
    }
    if !has_texture {
        return Err(AppError::input("no texture uploaded"));
    }
    target.validate()?;
    if !(near > 0.0 && near < far && far.is_finite()) {
        return Err(AppError::input(format!(
            "invalid clip planes: near={} far={}",
            near, far
        )));
    }
    Ok(())
}
