// SPDX-License-Identifier: GPL-3.0-only

//! Depth map to triangle mesh conversion
//!
//! Uses grid-based triangulation with depth discontinuity handling: every
//! valid depth pixel becomes a vertex, every 2x2 pixel quad contributes up to
//! two triangles, and triangles whose edges span a depth jump are dropped so
//! foreground and background never get stitched together.

mod depth_map;
mod depth_mesh;
mod generator;
mod types;

pub use depth_map::DepthMap;
pub use depth_mesh::{DepthMesh, MeshStats};
pub use generator::MeshGenerator;
pub use types::{DepthThresholds, EdgeBreakMode, Mesh, Triangle, Vertex, is_valid_depth};
