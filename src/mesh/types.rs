// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mesh vertex: camera-space position (meters) and normalized texture coordinate
///
/// Layout matches the GPU vertex buffer (3 + 2 floats, 20-byte stride).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Metric depth of the source pixel
    #[inline]
    pub fn depth(&self) -> f32 {
        self.position[2]
    }
}

/// Three indices into the vertex array
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Triangle {
    pub indices: [u32; 3],
}

impl Triangle {
    pub fn new(a: u32, b: u32, c: u32) -> Self {
        Self { indices: [a, b, c] }
    }
}

/// Triangle mesh built from one depth map
///
/// Vertex indices are assigned once, in row-major pixel order, and never change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }

    /// A mesh with no vertices or no triangles renders nothing
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Flat index list (three per triangle) for index buffer upload
    pub fn index_data(&self) -> &[u32] {
        bytemuck::cast_slice(&self.triangles)
    }

    /// Minimum and maximum vertex depth, `None` for a mesh without vertices
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        self.vertices.iter().map(Vertex::depth).fold(None, |acc, z| match acc {
            None => Some((z, z)),
            Some((lo, hi)) => Some((lo.min(z), hi.max(z))),
        })
    }
}

/// Depth is usable when finite and strictly positive
#[inline]
pub fn is_valid_depth(z: f32) -> bool {
    z.is_finite() && z > 0.0
}

/// How the absolute threshold behaves with distance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeBreakMode {
    /// `tau_abs` applies unchanged at every depth
    #[default]
    Fixed,
    /// `tau_abs` grows by `max(1, max(z1, z2) / 2)`, keeping more far-range triangles
    DepthScaled,
}

impl fmt::Display for EdgeBreakMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::DepthScaled => write!(f, "depth-scaled"),
        }
    }
}

impl FromStr for EdgeBreakMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "depth-scaled" | "depth_scaled" | "adaptive" => Ok(Self::DepthScaled),
            other => Err(AppError::Config(format!("unknown edge mode '{}'", other))),
        }
    }
}

/// Depth discontinuity thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthThresholds {
    /// Relative threshold (fraction of the nearer depth)
    pub tau_rel: f32,
    /// Absolute threshold (meters)
    pub tau_abs: f32,
    #[serde(default)]
    pub mode: EdgeBreakMode,
}

impl Default for DepthThresholds {
    fn default() -> Self {
        Self {
            tau_rel: crate::constants::DEFAULT_TAU_REL,
            tau_abs: crate::constants::DEFAULT_TAU_ABS,
            mode: EdgeBreakMode::Fixed,
        }
    }
}

impl DepthThresholds {
    pub fn new(tau_rel: f32, tau_abs: f32) -> Self {
        Self {
            tau_rel,
            tau_abs,
            mode: EdgeBreakMode::Fixed,
        }
    }

    pub fn with_mode(self, mode: EdgeBreakMode) -> Self {
        Self { mode, ..self }
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(self.tau_rel > 0.0 && self.tau_abs > 0.0) {
            return Err(AppError::Config(format!(
                "depth thresholds must be positive (tau_rel={}, tau_abs={})",
                self.tau_rel, self.tau_abs
            )));
        }
        Ok(())
    }

    /// Whether the edge between two depth samples must be broken
    ///
    /// Invalid samples always count as a discontinuity.
    pub fn is_discontinuity(&self, z1: f32, z2: f32) -> bool {
        if !is_valid_depth(z1) || !is_valid_depth(z2) {
            return true;
        }

        let diff = (z1 - z2).abs();
        let tau_abs = match self.mode {
            EdgeBreakMode::Fixed => self.tau_abs,
            EdgeBreakMode::DepthScaled => self.tau_abs * (z1.max(z2) / 2.0).max(1.0),
        };

        diff / z1.min(z2) > self.tau_rel || diff > tau_abs
    }

    /// All three edges of a triangle are continuous
    pub fn is_continuous_triangle(&self, z0: f32, z1: f32, z2: f32) -> bool {
        !self.is_discontinuity(z0, z1)
            && !self.is_discontinuity(z1, z2)
            && !self.is_discontinuity(z2, z0)
    }
}
