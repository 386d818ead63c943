// SPDX-License-Identifier: GPL-3.0-only

//! CPU rasterizer
//!
//! Follows GL raster conventions: NDC z in [-1, 1] mapped to window depth in
//! [0, 1], bottom-left raster origin, `LESS` depth test against a buffer
//! cleared to 1.0, near-plane clipping, perspective-correct interpolation and
//! a top-left fill rule. Screen positions are snapped to 1/256 pixel so shared
//! edges and vertices are resolved exactly once.

use super::contract::{VertexOutput, fragment_stage, to_unorm8, vertex_stage};
use super::output::{RasterOrigin, RenderOutput, assemble_output};
use super::{CachedDimensions, RasterSurface, validate_render_request};
use crate::constants::METRIC_DEPTH_CLEAR;
use crate::errors::{AppError, AppResult};
use crate::geometry::{Intrinsics, projection_matrix};
use crate::mesh::Mesh;
use glam::Vec2;
use image::RgbImage;
use tracing::debug;

const SUBPIXEL_STEPS: f64 = 256.0;

/// Native attachments of the software surface (bottom-left origin)
struct Framebuffer {
    dims: CachedDimensions,
    color: Vec<u8>,
    metric_depth: Vec<f32>,
    mask: Vec<u8>,
    depth: Vec<f32>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            dims: CachedDimensions::new(width, height),
            color: vec![0; pixels * 4],
            metric_depth: vec![METRIC_DEPTH_CLEAR; pixels],
            mask: vec![0; pixels],
            depth: vec![1.0; pixels],
        }
    }

    fn clear(&mut self) {
        self.color.fill(0);
        self.metric_depth.fill(METRIC_DEPTH_CLEAR);
        self.mask.fill(0);
        self.depth.fill(1.0);
    }
}

/// Window-space vertex ready for scan conversion
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f64,
    y: f64,
    z: f64,
    inv_w: f64,
    uv: Vec2,
    view_z: f32,
}

impl ScreenVertex {
    fn from_clip(v: &VertexOutput, width: u32, height: u32) -> Self {
        let inv_w = 1.0 / v.clip.w as f64;
        let ndc_x = v.clip.x as f64 * inv_w;
        let ndc_y = v.clip.y as f64 * inv_w;
        let ndc_z = v.clip.z as f64 * inv_w;
        Self {
            x: snap((ndc_x + 1.0) * 0.5 * width as f64),
            y: snap((ndc_y + 1.0) * 0.5 * height as f64),
            z: (ndc_z + 1.0) * 0.5,
            inv_w,
            uv: v.uv,
            view_z: v.view_z,
        }
    }
}

#[inline]
fn snap(v: f64) -> f64 {
    (v * SUBPIXEL_STEPS).round() / SUBPIXEL_STEPS
}

/// Signed area term of `p` against edge `a -> b` (positive on the left)
///
/// Endpoints are ordered canonically so both triangles sharing an edge
/// compute exactly negated values.
#[inline]
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f64, py: f64) -> f64 {
    if (a.x, a.y) > (b.x, b.y) {
        return -edge(b, a, px, py);
    }
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Top-left rule for a counter-clockwise triangle in a y-up frame
#[inline]
fn is_top_left(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    let dy = b.y - a.y;
    dy < 0.0 || (dy == 0.0 && b.x < a.x)
}

#[inline]
fn covers(w: f64, a: &ScreenVertex, b: &ScreenVertex) -> bool {
    w > 0.0 || (w == 0.0 && is_top_left(a, b))
}

/// Clip a triangle against the near plane (`z + w >= 0`)
fn clip_near(tri: &[VertexOutput; 3], out: &mut [VertexOutput; 4]) -> usize {
    let dist = |v: &VertexOutput| v.clip.z + v.clip.w;
    let mut n = 0;
    for i in 0..3 {
        let a = &tri[i];
        let b = &tri[(i + 1) % 3];
        let (da, db) = (dist(a), dist(b));
        if da >= 0.0 {
            out[n] = *a;
            n += 1;
        }
        if (da >= 0.0) != (db >= 0.0) {
            out[n] = a.lerp(b, da / (da - db));
            n += 1;
        }
    }
    n
}

fn rasterize_triangle(fb: &mut Framebuffer, texture: &RgbImage, tri: [ScreenVertex; 3]) {
    let width = fb.dims.width;
    let height = fb.dims.height;
    let [v0, mut v1, mut v2] = tri;

    let mut area = edge(&v0, &v1, v2.x, v2.y);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut v1, &mut v2);
        area = -area;
    }

    let min_x = v0.x.min(v1.x).min(v2.x);
    let max_x = v0.x.max(v1.x).max(v2.x);
    let min_y = v0.y.min(v1.y).min(v2.y);
    let max_y = v0.y.max(v1.y).max(v2.y);

    // Pixel centers at +0.5 inside the bounding box
    let x_start = (min_x - 0.5).ceil().max(0.0);
    let x_end = (max_x - 0.5).floor().min(width as f64 - 1.0);
    let y_start = (min_y - 0.5).ceil().max(0.0);
    let y_end = (max_y - 0.5).floor().min(height as f64 - 1.0);
    if x_start > x_end || y_start > y_end {
        return;
    }

    for py in y_start as u32..=y_end as u32 {
        let cy = py as f64 + 0.5;
        let row = py as usize * width as usize;

        for px in x_start as u32..=x_end as u32 {
            let cx = px as f64 + 0.5;

            let w0 = edge(&v1, &v2, cx, cy);
            let w1 = edge(&v2, &v0, cx, cy);
            let w2 = edge(&v0, &v1, cx, cy);
            if !(covers(w0, &v1, &v2) && covers(w1, &v2, &v0) && covers(w2, &v0, &v1)) {
                continue;
            }

            let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
            let z = l0 * v0.z + l1 * v1.z + l2 * v2.z;
            if z > 1.0 {
                continue;
            }
            let z = z.max(0.0) as f32;

            let idx = row + px as usize;
            if z >= fb.depth[idx] {
                continue;
            }

            let p0 = l0 * v0.inv_w;
            let p1 = l1 * v1.inv_w;
            let p2 = l2 * v2.inv_w;
            let sum = p0 + p1 + p2;
            let (b0, b1, b2) = ((p0 / sum) as f32, (p1 / sum) as f32, (p2 / sum) as f32);

            let uv = v0.uv * b0 + v1.uv * b1 + v2.uv * b2;
            let view_z = v0.view_z * b0 + v1.view_z * b1 + v2.view_z * b2;
            let frag = fragment_stage(texture, uv, view_z);

            fb.depth[idx] = z;
            for (c, value) in frag.color.iter().enumerate() {
                fb.color[idx * 4 + c] = to_unorm8(*value);
            }
            fb.metric_depth[idx] = frag.metric_depth;
            fb.mask[idx] = to_unorm8(frag.mask);
        }
    }
}

/// Deterministic CPU implementation of [`RasterSurface`]
#[derive(Default)]
pub struct SoftwareSurface {
    mesh: Option<Mesh>,
    texture: Option<RgbImage>,
    framebuffer: Option<Framebuffer>,
    generation: u64,
}

impl SoftwareSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_framebuffer(&mut self, width: u32, height: u32) {
        let current = self.framebuffer.as_ref().map(|fb| fb.dims);
        if current.is_some_and(|dims| !dims.needs_update(width, height)) {
            return;
        }
        debug!(width, height, "Allocating software framebuffer");
        self.framebuffer = Some(Framebuffer::new(width, height));
        self.generation += 1;
    }
}

impl RasterSurface for SoftwareSurface {
    fn upload_mesh(&mut self, mesh: &Mesh) -> AppResult<()> {
        if mesh.is_empty() {
            return Err(AppError::input("cannot upload an empty mesh"));
        }
        let vertex_count = mesh.num_vertices() as u32;
        if mesh.index_data().iter().any(|&i| i >= vertex_count) {
            return Err(AppError::input("mesh index out of range"));
        }
        self.mesh = Some(mesh.clone());
        debug!(
            vertices = mesh.num_vertices(),
            triangles = mesh.num_triangles(),
            "Mesh uploaded"
        );
        Ok(())
    }

    fn upload_texture(&mut self, texture: &RgbImage) -> AppResult<()> {
        if texture.width() == 0 || texture.height() == 0 {
            return Err(AppError::input("cannot upload an empty texture"));
        }
        self.texture = Some(texture.clone());
        debug!(
            width = texture.width(),
            height = texture.height(),
            "Texture uploaded"
        );
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
        self.ensure_framebuffer(target.width, target.height);

        let Self {
            mesh: Some(mesh),
            texture: Some(texture),
            framebuffer: Some(fb),
            ..
        } = self
        else {
            return Err(AppError::render("software surface is not ready"));
        };

        debug!(
            zoom = target.fx / source.fx,
            width = target.width,
            height = target.height,
            "Software render"
        );

        fb.clear();
        let projection = projection_matrix(target, near, far);
        let vertices: Vec<VertexOutput> = mesh
            .vertices
            .iter()
            .map(|v| vertex_stage(&projection, v))
            .collect();

        let mut clipped = [VertexOutput::default(); 4];
        for triangle in &mesh.triangles {
            let [a, b, c] = triangle.indices;
            let tri = [
                vertices[a as usize],
                vertices[b as usize],
                vertices[c as usize],
            ];
            let n = clip_near(&tri, &mut clipped);
            if n < 3 {
                continue;
            }
            let screen: Vec<ScreenVertex> = clipped[..n]
                .iter()
                .map(|v| ScreenVertex::from_clip(v, target.width, target.height))
                .collect();
            for i in 1..n - 1 {
                rasterize_triangle(fb, texture, [screen[0], screen[i], screen[i + 1]]);
            }
        }

        assemble_output(
            target.width,
            target.height,
            RasterOrigin::BottomLeft,
            &fb.color,
            &fb.metric_depth,
            &fb.mask,
        )
    }

    fn describe(&self) -> String {
        "software rasterizer".to_string()
    }

    fn target_generation(&self) -> u64 {
        self.generation
    }
}
