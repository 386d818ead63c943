// SPDX-License-Identifier: GPL-3.0-only

//! Grid triangulation of a depth map

use super::types::{DepthThresholds, Mesh, Triangle, Vertex, is_valid_depth};
use super::DepthMap;
use crate::errors::{AppError, AppResult};
use crate::geometry::Intrinsics;
use tracing::debug;

/// Builds a camera-space mesh from a depth map
#[derive(Debug, Clone, Default)]
pub struct MeshGenerator {
    thresholds: DepthThresholds,
}

impl MeshGenerator {
    pub fn new(thresholds: DepthThresholds) -> Self {
        Self { thresholds }
    }

    /// Generate a mesh from every valid depth pixel
    pub fn generate(&self, depth: &DepthMap, intrinsics: &Intrinsics) -> AppResult<Mesh> {
        self.generate_masked(depth, intrinsics, None)
    }

    /// Generate a mesh, additionally skipping pixels whose mask entry is zero
    ///
    /// `intrinsics` must describe the depth map's resolution; texture
    /// coordinates are normalized against it.
    pub fn generate_masked(
        &self,
        depth: &DepthMap,
        intrinsics: &Intrinsics,
        valid_mask: Option<&[u8]>,
    ) -> AppResult<Mesh> {
        if depth.is_empty() {
            return Err(AppError::input("empty depth map"));
        }

        let width = depth.width();
        let height = depth.height();

        if intrinsics.width != width || intrinsics.height != height {
            return Err(AppError::input(format!(
                "intrinsics describe {}x{} but depth map is {}x{}",
                intrinsics.width, intrinsics.height, width, height
            )));
        }
        intrinsics.validate()?;

        if let Some(mask) = valid_mask {
            if mask.len() != depth.as_slice().len() {
                return Err(AppError::input(format!(
                    "validity mask has {} entries, expected {}",
                    mask.len(),
                    depth.as_slice().len()
                )));
            }
        }

        let w = width as usize;
        let h = height as usize;
        let mut mesh = Mesh::default();

        // Pixel -> vertex index, -1 where no vertex exists
        let mut vertex_map: Vec<i32> = vec![-1; w * h];
        mesh.vertices.reserve(w * h);

        for v in 0..height {
            for u in 0..width {
                let idx = v as usize * w + u as usize;
                let z = depth.get(u, v);

                let valid = is_valid_depth(z) && valid_mask.is_none_or(|m| m[idx] > 0);
                if !valid {
                    continue;
                }

                vertex_map[idx] = mesh.vertices.len() as i32;
                mesh.vertices.push(Vertex {
                    position: intrinsics.backproject(u, v, z).to_array(),
                    uv: intrinsics.texcoord(u, v),
                });
            }
        }

        mesh.triangles
            .reserve(w.saturating_sub(1) * h.saturating_sub(1) * 2);

        for v in 0..height.saturating_sub(1) {
            for u in 0..width.saturating_sub(1) {
                let idx00 = v as usize * w + u as usize;
                let idx10 = idx00 + 1;
                let idx01 = idx00 + w;
                let idx11 = idx01 + 1;

                let corners = [
                    (vertex_map[idx00], depth.get(u, v)),
                    (vertex_map[idx10], depth.get(u + 1, v)),
                    (vertex_map[idx01], depth.get(u, v + 1)),
                    (vertex_map[idx11], depth.get(u + 1, v + 1)),
                ];

                // Fixed diagonal split: {00, 10, 11} and {00, 11, 01}
                for [a, b, c] in [[0usize, 1, 3], [0, 3, 2]] {
                    if let Some(triangle) = self.candidate(corners[a], corners[b], corners[c]) {
                        mesh.triangles.push(triangle);
                    }
                }
            }
        }

        mesh.vertices.shrink_to_fit();
        mesh.triangles.shrink_to_fit();

        debug!(
            vertices = mesh.vertices.len(),
            triangles = mesh.triangles.len(),
            width,
            height,
            "Generated depth mesh"
        );

        Ok(mesh)
    }

    fn candidate(&self, a: (i32, f32), b: (i32, f32), c: (i32, f32)) -> Option<Triangle> {
        if a.0 < 0 || b.0 < 0 || c.0 < 0 {
            return None;
        }
        if !self.thresholds.is_continuous_triangle(a.1, b.1, c.1) {
            return None;
        }
        Some(Triangle::new(a.0 as u32, b.0 as u32, c.0 as u32))
    }
}
