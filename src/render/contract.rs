// SPDX-License-Identifier: GPL-3.0-only

//! Per-vertex and per-fragment computation shared by every raster surface
//!
//! The WGSL program in `shaders/rerender/rerender.wgsl` implements the same
//! stages on the GPU; the software surface calls these functions directly.

use crate::mesh::Vertex;
use glam::{Mat4, Vec2, Vec3, Vec4};
use image::RgbImage;

/// Vertex stage result
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VertexOutput {
    /// Clip-space position (GL convention, z in [-w, w] inside the frustum)
    pub clip: Vec4,
    pub uv: Vec2,
    /// Camera-space Z of the vertex, interpolated perspective-correctly
    pub view_z: f32,
}

impl VertexOutput {
    /// Linear blend in clip space, used when clipping edges
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            uv: self.uv.lerp(other.uv, t),
            view_z: self.view_z + (other.view_z - self.view_z) * t,
        }
    }
}

/// Fragment stage result, written to the three color attachments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentOutput {
    /// Sampled color with alpha 1
    pub color: [f32; 4],
    pub metric_depth: f32,
    pub mask: f32,
}

/// Transform a camera-space vertex by the target projection
pub fn vertex_stage(projection: &Mat4, vertex: &Vertex) -> VertexOutput {
    let position = Vec3::from_array(vertex.position);
    VertexOutput {
        clip: *projection * position.extend(1.0),
        uv: Vec2::from_array(vertex.uv),
        view_z: vertex.position[2],
    }
}

/// Shade one covered pixel
pub fn fragment_stage(texture: &RgbImage, uv: Vec2, view_z: f32) -> FragmentOutput {
    let rgb = sample_bilinear(texture, uv);
    FragmentOutput {
        color: [rgb[0], rgb[1], rgb[2], 1.0],
        metric_depth: view_z,
        mask: 1.0,
    }
}

/// Bilinear, clamp-to-edge sample of an RGB8 texture, returned in [0, 1]
///
/// Texel `(i, j)` has its center at `((i + 0.5) / W, (j + 0.5) / H)`, with
/// `v = 0` at the first row in memory.
pub fn sample_bilinear(texture: &RgbImage, uv: Vec2) -> [f32; 3] {
    let (w, h) = texture.dimensions();
    if w == 0 || h == 0 {
        return [0.0; 3];
    }

    let x = uv.x * w as f32 - 0.5;
    let y = uv.y * h as f32 - 0.5;
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;

    let clamp_x = |i: f32| (i.max(0.0) as u32).min(w - 1);
    let clamp_y = |j: f32| (j.max(0.0) as u32).min(h - 1);
    let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
    let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));

    let p00 = texture.get_pixel(xa, ya).0;
    let p10 = texture.get_pixel(xb, ya).0;
    let p01 = texture.get_pixel(xa, yb).0;
    let p11 = texture.get_pixel(xb, yb).0;

    let mut out = [0.0f32; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - tx) + p10[c] as f32 * tx;
        let bottom = p01[c] as f32 * (1.0 - tx) + p11[c] as f32 * tx;
        *value = (top * (1.0 - ty) + bottom * ty) / 255.0;
    }
    out
}

/// Quantize a normalized value the way an 8-bit unorm attachment stores it
#[inline]
pub fn to_unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
