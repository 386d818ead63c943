// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::{AppError, AppResult};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics
///
/// `fx`/`fy` are focal lengths in pixels, `cx`/`cy` the principal point in
/// pixels, `width`/`height` the image size the parameters refer to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Intrinsics with the principal point at the image center
    pub fn centered(fx: f32, fy: f32, width: u32, height: u32) -> Self {
        Self::new(fx, fy, width as f32 / 2.0, height as f32 / 2.0, width, height)
    }

    /// Check `fx, fy > 0` and a non-empty image
    pub fn validate(&self) -> AppResult<()> {
        if !(self.fx.is_finite() && self.fx > 0.0 && self.fy.is_finite() && self.fy > 0.0) {
            return Err(AppError::input(format!(
                "focal lengths must be positive (fx={}, fy={})",
                self.fx, self.fy
            )));
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(AppError::input("principal point must be finite"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(AppError::input(format!(
                "image size must be non-empty ({}x{})",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Uniform focal rescale (zoom); principal point and size unchanged
    pub fn scaled(&self, scale: f32) -> Self {
        Self {
            fx: self.fx * scale,
            fy: self.fy * scale,
            ..*self
        }
    }

    /// Same camera expressed at a different resolution
    pub fn with_resolution(&self, width: u32, height: u32) -> Self {
        let sx = width as f32 / self.width as f32;
        let sy = height as f32 / self.height as f32;
        Self::new(
            self.fx * sx,
            self.fy * sy,
            self.cx * sx,
            self.cy * sy,
            width,
            height,
        )
    }

    /// Target intrinsics for one focal setting
    ///
    /// Focal lengths are multiplied by `scale`. With an output size override
    /// that differs from the source, only the principal point follows the
    /// resolution change; the focal lengths stay in source pixels.
    pub fn target_for_scale(&self, scale: f32, output_size: Option<(u32, u32)>) -> Self {
        let mut target = self.scaled(scale);
        if let Some((width, height)) = output_size {
            if width != self.width || height != self.height {
                target.cx = self.cx * width as f32 / self.width as f32;
                target.cy = self.cy * height as f32 / self.height as f32;
            }
            target.width = width;
            target.height = height;
        }
        target
    }

    /// Project a camera-space point to continuous pixel coordinates
    pub fn project(&self, point: Vec3) -> (f32, f32) {
        (
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        )
    }

    /// Back-project the center of pixel `(u, v)` at metric depth `z`
    pub fn backproject(&self, u: u32, v: u32, z: f32) -> Vec3 {
        let uc = u as f32 + 0.5;
        let vc = v as f32 + 0.5;
        Vec3::new((uc - self.cx) * z / self.fx, (vc - self.cy) * z / self.fy, z)
    }

    /// Normalized texture coordinate of the center of pixel `(u, v)`
    pub fn texcoord(&self, u: u32, v: u32) -> [f32; 2] {
        [
            (u as f32 + 0.5) / self.width as f32,
            (v as f32 + 0.5) / self.height as f32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaled_keeps_principal_point() {
        let k = Intrinsics::new(500.0, 510.0, 320.0, 240.0, 640, 480);
        let z = k.scaled(2.0);
        assert_eq!(z.fx, 1000.0);
        assert_eq!(z.fy, 1020.0);
        assert_eq!(z.cx, 320.0);
        assert_eq!(z.cy, 240.0);
        assert_eq!((z.width, z.height), (640, 480));
    }

    #[test]
    fn test_with_resolution_scales_everything() {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0, 640, 480);
        let half = k.with_resolution(320, 240);
        assert_eq!(half.fx, 250.0);
        assert_eq!(half.cx, 160.0);
        assert_eq!(half.cy, 120.0);
    }

    #[test]
    fn test_target_for_scale_with_override_moves_only_principal_point() {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0, 640, 480);
        let t = k.target_for_scale(1.5, Some((1280, 960)));
        assert_eq!(t.fx, 750.0);
        assert_eq!(t.cx, 640.0);
        assert_eq!(t.cy, 480.0);
        assert_eq!((t.width, t.height), (1280, 960));

        let same = k.target_for_scale(1.5, Some((640, 480)));
        assert_eq!(same, k.scaled(1.5));
        assert_eq!(k.target_for_scale(1.5, None), k.scaled(1.5));
    }

    #[test]
    fn test_backproject_then_project_hits_pixel_center() {
        let k = Intrinsics::new(525.0, 520.0, 319.5, 239.5, 640, 480);
        let p = k.backproject(17, 401, 3.25);
        assert_eq!(p.z, 3.25);
        let (u, v) = k.project(p);
        assert_relative_eq!(u, 17.5, epsilon = 1e-3);
        assert_relative_eq!(v, 401.5, epsilon = 1e-3);
    }

    #[test]
    fn test_validate() {
        assert!(Intrinsics::centered(525.0, 525.0, 640, 480).validate().is_ok());
        assert!(Intrinsics::centered(0.0, 525.0, 640, 480).validate().is_err());
        assert!(Intrinsics::centered(525.0, -1.0, 640, 480).validate().is_err());
        assert!(Intrinsics::centered(525.0, 525.0, 0, 480).validate().is_err());
    }
}
