// SPDX-License-Identifier: GPL-3.0-only

//! Build once, upload once, render once per focal scale
//!
//! ```text
//! RGB + depth ──▶ DepthMesh::build ──▶ upload mesh/texture ──▶ render(scale₁)
//!                                                         ├──▶ render(scale₂)
//!                                                         └──▶ ...
//! ```

use crate::errors::{AppError, AppResult};
use crate::geometry::Intrinsics;
use crate::mesh::{DepthMap, DepthMesh, DepthThresholds, MeshStats};
use crate::render::{RasterSurface, RenderOutput};
use image::DynamicImage;
use tracing::{debug, info, warn};

/// Clip planes and optional output resolution shared by every target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub near: f32,
    pub far: f32,
    /// Output width; `None` keeps the source width
    pub output_width: Option<u32>,
    /// Output height; `None` keeps the source height
    pub output_height: Option<u32>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            near: crate::constants::DEFAULT_NEAR,
            far: crate::constants::DEFAULT_FAR,
            output_width: None,
            output_height: None,
        }
    }
}

impl RenderSettings {
    /// Output `(width, height)` for `source`, or `None` when neither is overridden
    pub fn output_size(&self, source: &Intrinsics) -> Option<(u32, u32)> {
        match (self.output_width, self.output_height) {
            (None, None) => None,
            (w, h) => Some((w.unwrap_or(source.width), h.unwrap_or(source.height))),
        }
    }
}

/// One rendered focal setting
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub scale: f32,
    pub target: Intrinsics,
    pub output: RenderOutput,
}

/// Canonical re-rendering driver around one raster surface
pub struct Rerenderer {
    depth_mesh: DepthMesh,
    surface: Box<dyn RasterSurface>,
    settings: RenderSettings,
}

impl Rerenderer {
    pub fn new(surface: Box<dyn RasterSurface>, settings: RenderSettings) -> Self {
        Self {
            depth_mesh: DepthMesh::new(),
            surface,
            settings,
        }
    }

    /// Build the mesh from an RGB-D frame and upload it with its texture
    pub fn prepare(
        &mut self,
        rgb: &DynamicImage,
        depth: &DepthMap,
        source: &Intrinsics,
        thresholds: DepthThresholds,
    ) -> AppResult<MeshStats> {
        self.depth_mesh.build(rgb, depth, source, thresholds)?;

        let texture = self
            .depth_mesh
            .texture()
            .ok_or_else(|| AppError::input("mesh build produced no texture"))?;
        self.surface.upload_mesh(self.depth_mesh.mesh())?;
        self.surface.upload_texture(texture)?;

        Ok(self.depth_mesh.stats())
    }

    /// Render the prepared mesh with focal lengths multiplied by `scale`
    pub fn render_scale(&mut self, scale: f32) -> AppResult<FrameResult> {
        let source = *self
            .depth_mesh
            .intrinsics()
            .ok_or_else(|| AppError::input("render requested before prepare"))?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::input(format!("invalid focal scale {}", scale)));
        }

        let target = source.target_for_scale(scale, self.settings.output_size(&source));
        debug!(
            scale,
            fx = target.fx,
            fy = target.fy,
            cx = target.cx,
            cy = target.cy,
            width = target.width,
            height = target.height,
            "Target intrinsics"
        );

        let output = self
            .surface
            .render(&source, &target, self.settings.near, self.settings.far)?;

        info!(
            scale,
            valid_pixels = output.valid_count(),
            coverage_pct = output.valid_fraction() * 100.0,
            "Rendered"
        );

        Ok(FrameResult {
            scale,
            target,
            output,
        })
    }

    /// Render every scale in order, handing each frame to `on_frame`
    ///
    /// Per-target failures are logged and skipped; a fatal error stops the
    /// run. Returns the number of frames rendered.
    pub fn render_each(
        &mut self,
        scales: &[f32],
        mut on_frame: impl FnMut(FrameResult),
    ) -> AppResult<usize> {
        let mut rendered = 0;
        for (i, &scale) in scales.iter().enumerate() {
            info!(scale, index = i + 1, total = scales.len(), "Processing focal scale");
            match self.render_scale(scale) {
                Ok(frame) => {
                    rendered += 1;
                    on_frame(frame);
                }
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) => warn!(scale, error = %e, "Skipping focal scale"),
            }
        }
        Ok(rendered)
    }

    /// Render every scale and collect the successful frames
    pub fn render_all(&mut self, scales: &[f32]) -> AppResult<Vec<FrameResult>> {
        let mut frames = Vec::with_capacity(scales.len());
        self.render_each(scales, |frame| frames.push(frame))?;
        Ok(frames)
    }

    pub fn depth_mesh(&self) -> &DepthMesh {
        &self.depth_mesh
    }

    pub fn surface(&self) -> &dyn RasterSurface {
        self.surface.as_ref()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::render::SoftwareSurface;
    use crate::synthetic::disc_scene;
    use image::RgbImage;

    fn prepared(settings: RenderSettings) -> Rerenderer {
        let frame = disc_scene(64, 48, 5.0, 2.0);
        let source = Intrinsics::centered(60.0, 60.0, 64, 48);
        let mut driver = Rerenderer::new(Box::new(SoftwareSurface::new()), settings);
        driver
            .prepare(
                &DynamicImage::ImageRgb8(frame.rgb),
                &frame.depth,
                &source,
                DepthThresholds::default(),
            )
            .unwrap();
        driver
    }

    #[test]
    fn test_render_before_prepare_is_rejected() {
        let mut driver =
            Rerenderer::new(Box::new(SoftwareSurface::new()), RenderSettings::default());
        let err = driver.render_scale(1.0).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }

    #[test]
    fn test_render_all_scales() {
        let mut driver = prepared(RenderSettings::default());
        let frames = driver.render_all(&[0.5, 1.0, 2.0]).unwrap();

        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.target.fx, 60.0 * frame.scale);
            assert_eq!((frame.output.width, frame.output.height), (64, 48));
            assert!(frame.output.valid_count() > 0);
        }
        // One framebuffer serves every scale at the same resolution
        assert_eq!(driver.surface().target_generation(), 1);
    }

    #[test]
    fn test_invalid_scales_are_skipped() {
        let mut driver = prepared(RenderSettings::default());
        let frames = driver.render_all(&[0.0, 1.0, -2.0, f32::NAN]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].scale, 1.0);
    }

    #[test]
    fn test_output_size_override_rescales_principal_point() {
        let settings = RenderSettings {
            output_width: Some(32),
            output_height: Some(24),
            ..Default::default()
        };
        let mut driver = prepared(settings);
        let frame = driver.render_scale(1.0).unwrap();
        assert_eq!((frame.output.width, frame.output.height), (32, 24));
        assert_eq!(frame.target.cx, 16.0);
        assert_eq!(frame.target.cy, 12.0);
        assert_eq!(frame.target.fx, 60.0);
    }

    #[test]
    fn test_missing_output_dimension_keeps_source_size() {
        let source = Intrinsics::centered(60.0, 60.0, 64, 48);
        let width_only = RenderSettings {
            output_width: Some(32),
            ..Default::default()
        };
        assert_eq!(width_only.output_size(&source), Some((32, 48)));

        let height_only = RenderSettings {
            output_height: Some(24),
            ..Default::default()
        };
        assert_eq!(height_only.output_size(&source), Some((64, 24)));
        assert_eq!(RenderSettings::default().output_size(&source), None);
    }

    /// Surface that fails every render with a fixed error
    struct FailingSurface(AppError);

    impl RasterSurface for FailingSurface {
        fn upload_mesh(&mut self, _mesh: &Mesh) -> AppResult<()> {
            Ok(())
        }

        fn upload_texture(&mut self, _texture: &RgbImage) -> AppResult<()> {
            Ok(())
        }

        fn render(
            &mut self,
            _source: &Intrinsics,
            _target: &Intrinsics,
            _near: f32,
            _far: f32,
        ) -> AppResult<RenderOutput> {
            Err(self.0.clone())
        }

        fn describe(&self) -> String {
            "failing".into()
        }

        fn target_generation(&self) -> u64 {
            0
        }
    }

    fn failing_driver(error: AppError) -> Rerenderer {
        let frame = disc_scene(16, 16, 5.0, 2.0);
        let mut driver = Rerenderer::new(Box::new(FailingSurface(error)), RenderSettings::default());
        driver
            .prepare(
                &DynamicImage::ImageRgb8(frame.rgb),
                &frame.depth,
                &Intrinsics::centered(20.0, 20.0, 16, 16),
                DepthThresholds::default(),
            )
            .unwrap();
        driver
    }

    #[test]
    fn test_render_failures_do_not_stop_the_run() {
        let mut driver = failing_driver(AppError::render("out of memory"));
        assert_eq!(driver.render_each(&[0.5, 1.0], |_| {}).unwrap(), 0);
    }

    #[test]
    fn test_fatal_errors_abort_the_run() {
        let mut driver = failing_driver(AppError::ResourceCreation("lost device".into()));
        let err = driver.render_all(&[0.5, 1.0]).unwrap_err();
        assert!(matches!(err, AppError::ResourceCreation(_)));
    }
}
