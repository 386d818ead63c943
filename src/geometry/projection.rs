// SPDX-License-Identifier: GPL-3.0-only

use super::Intrinsics;
use glam::{Mat4, Vec4};

/// Build the clip-space transform for a pinhole camera
///
/// Maps camera-space `(X, Y, Z, 1)` to clip space so that after the
/// perspective divide
///
/// ```text
/// x_ndc = 2u'/W' - 1     with u' = fx' X/Z + cx'
/// y_ndc = 1 - 2v'/H'     with v' = fy' Y/Z + cy'
/// ```
///
/// and `w_c = Z`. The z row is the usual linear near/far remap into
/// `[-1, 1]`. It only drives the window-space depth test; metric depth is
/// carried separately from camera-space Z.
///
/// Requires `0 < near < far`.
pub fn projection_matrix(target: &Intrinsics, near: f32, far: f32) -> Mat4 {
    debug_assert!(
        near > 0.0 && near < far,
        "projection requires 0 < near < far"
    );

    let w = target.width as f32;
    let h = target.height as f32;

    Mat4::from_cols(
        Vec4::new(2.0 * target.fx / w, 0.0, 0.0, 0.0),
        // Flip Y: image rows grow downwards, NDC y grows upwards
        Vec4::new(0.0, -2.0 * target.fy / h, 0.0, 0.0),
        Vec4::new(
            2.0 * target.cx / w - 1.0,
            1.0 - 2.0 * target.cy / h,
            (far + near) / (far - near),
            1.0,
        ),
        Vec4::new(0.0, 0.0, -2.0 * far * near / (far - near), 0.0),
    )
}

/// Convert NDC x/y to continuous top-left-origin pixel coordinates
pub fn ndc_to_pixel(x_ndc: f32, y_ndc: f32, width: u32, height: u32) -> (f32, f32) {
    (
        (x_ndc + 1.0) * 0.5 * width as f32,
        (1.0 - y_ndc) * 0.5 * height as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    fn clip_of(m: &Mat4, p: Vec3) -> Vec4 {
        *m * p.extend(1.0)
    }

    #[test]
    fn test_coefficients() {
        let k = Intrinsics::new(500.0, 400.0, 300.0, 200.0, 640, 480);
        let m = projection_matrix(&k, 0.5, 50.0);
        let c = m.to_cols_array_2d();
        assert_relative_eq!(c[0][0], 2.0 * 500.0 / 640.0);
        assert_relative_eq!(c[1][1], -2.0 * 400.0 / 480.0);
        assert_relative_eq!(c[2][0], 2.0 * 300.0 / 640.0 - 1.0);
        assert_relative_eq!(c[2][1], 1.0 - 2.0 * 200.0 / 480.0);
        assert_relative_eq!(c[2][2], 50.5 / 49.5);
        assert_relative_eq!(c[2][3], 1.0);
        assert_relative_eq!(c[3][2], -2.0 * 50.0 * 0.5 / 49.5);
        assert_eq!(c[3][3], 0.0);
    }

    #[test]
    fn test_w_equals_camera_z() {
        let k = Intrinsics::centered(525.0, 525.0, 640, 480);
        let m = projection_matrix(&k, 0.1, 100.0);
        let clip = clip_of(&m, Vec3::new(0.3, -0.7, 4.2));
        assert_relative_eq!(clip.w, 4.2);
    }

    #[test]
    fn test_near_far_map_to_ndc_bounds() {
        let k = Intrinsics::centered(525.0, 525.0, 640, 480);
        let m = projection_matrix(&k, 0.1, 100.0);
        let near = clip_of(&m, Vec3::new(0.0, 0.0, 0.1));
        let far = clip_of(&m, Vec3::new(0.0, 0.0, 100.0));
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-4);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_round_trip_reproduces_pixel_centers() {
        let k = Intrinsics::new(525.0, 518.0, 321.3, 238.9, 640, 480);
        let m = projection_matrix(&k, 0.1, 100.0);

        for &(u, v, z) in &[(0u32, 0u32, 1.0f32), (639, 479, 7.5), (100, 300, 0.4), (320, 240, 42.0)] {
            let p = k.backproject(u, v, z);
            let clip = clip_of(&m, p);
            let (px, py) = ndc_to_pixel(clip.x / clip.w, clip.y / clip.w, k.width, k.height);
            assert_relative_eq!(px, u as f32 + 0.5, epsilon = 1e-3);
            assert_relative_eq!(py, v as f32 + 0.5, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_optical_axis_lands_on_principal_point_at_any_scale() {
        let k = Intrinsics::centered(525.0, 525.0, 640, 480);
        for scale in [0.5, 1.0, 2.0, 4.0] {
            let m = projection_matrix(&k.scaled(scale), 0.1, 100.0);
            let clip = clip_of(&m, Vec3::new(0.0, 0.0, 3.0));
            let (px, py) = ndc_to_pixel(clip.x / clip.w, clip.y / clip.w, k.width, k.height);
            assert_relative_eq!(px, 320.0, epsilon = 1e-3);
            assert_relative_eq!(py, 240.0, epsilon = 1e-3);
        }
    }
}
