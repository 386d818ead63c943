// SPDX-License-Identifier: GPL-3.0-only

//! RGB-D re-rendering under variable focal lengths
//!
//! A registered color image and metric depth map are turned into a textured
//! triangle mesh that breaks at depth discontinuities, then rasterized again
//! from the same viewpoint with new intrinsics. Every render yields a color
//! image, a metric depth map and a validity mask.
//!
//! # Architecture
//!
//! - [`geometry`]: pinhole intrinsics and the clip-space projection
//! - [`mesh`]: depth maps, discontinuity thresholds and mesh generation
//! - [`render`]: the raster surface trait, the shared shading contract, the
//!   software rasterizer and readback assembly
//! - [`gpu`] and [`shaders`]: wgpu context and the GPU raster surface
//! - [`pipelines`]: the build-once, render-many driver
//! - [`io`]: image, depth and NPY codecs
//! - [`config`]: run configuration
//! - [`synthetic`]: generated RGB-D frames
//!
//! # Example
//!
//! ```no_run
//! use rgbd_rerender::{
//!     DepthThresholds, Intrinsics, RenderSettings, Rerenderer, SoftwareSurface, synthetic,
//! };
//!
//! let frame = synthetic::disc_scene(320, 240, 5.0, 2.0);
//! let source = Intrinsics::centered(300.0, 300.0, 320, 240);
//! let mut driver = Rerenderer::new(Box::new(SoftwareSurface::new()), RenderSettings::default());
//! driver.prepare(
//!     &image::DynamicImage::ImageRgb8(frame.rgb),
//!     &frame.depth,
//!     &source,
//!     DepthThresholds::default(),
//! )?;
//! let frames = driver.render_all(&[0.5, 1.0, 2.0])?;
//! # Ok::<(), rgbd_rerender::AppError>(())
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod geometry;
pub mod gpu;
pub mod io;
pub mod mesh;
pub mod pipelines;
pub mod render;
pub mod shaders;
pub mod synthetic;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use geometry::{Intrinsics, projection_matrix};
pub use gpu::GpuContext;
pub use mesh::{DepthMap, DepthMesh, DepthThresholds, EdgeBreakMode, Mesh, MeshGenerator};
pub use pipelines::{FrameResult, RenderSettings, Rerenderer};
pub use render::{Backend, RasterSurface, RenderOutput, SoftwareSurface, create_surface};
pub use shaders::GpuSurface;
