// SPDX-License-Identifier: GPL-3.0-only

//! Mesh + texture pair built from one RGB-D frame

use super::{DepthMap, DepthThresholds, Mesh, MeshGenerator};
use crate::errors::{AppError, AppResult};
use crate::geometry::Intrinsics;
use image::{DynamicImage, RgbImage};
use tracing::info;

/// Mesh statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeshStats {
    pub vertices: usize,
    pub triangles: usize,
    pub min_depth: f32,
    pub max_depth: f32,
}

/// Owns the mesh and source texture produced from one RGB-D frame
///
/// A new `build` replaces everything; a failed build leaves the object empty.
#[derive(Debug, Default)]
pub struct DepthMesh {
    mesh: Mesh,
    texture: Option<RgbImage>,
    intrinsics: Option<Intrinsics>,
    stats: MeshStats,
}

impl DepthMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the mesh from an RGB-D pair
    ///
    /// The texture is stored as RGB8 (RGBA and grayscale inputs are
    /// converted). The intrinsics' width/height are replaced by the depth map
    /// size.
    pub fn build(
        &mut self,
        rgb: &DynamicImage,
        depth: &DepthMap,
        intrinsics: &Intrinsics,
        thresholds: DepthThresholds,
    ) -> AppResult<()> {
        self.clear();

        if rgb.width() == 0 || rgb.height() == 0 || depth.is_empty() {
            return Err(AppError::input("empty input images"));
        }

        if rgb.width() != depth.width() || rgb.height() != depth.height() {
            return Err(AppError::input(format!(
                "RGB and depth dimensions mismatch (RGB {}x{}, depth {}x{})",
                rgb.width(),
                rgb.height(),
                depth.width(),
                depth.height()
            )));
        }

        let intrinsics = Intrinsics {
            width: depth.width(),
            height: depth.height(),
            ..*intrinsics
        };

        let mesh = MeshGenerator::new(thresholds).generate(depth, &intrinsics)?;
        if mesh.is_empty() {
            return Err(AppError::input(
                "depth map produced no triangles (no valid continuous surface)",
            ));
        }

        let (min_depth, max_depth) = mesh.depth_range().unwrap_or_default();
        let stats = MeshStats {
            vertices: mesh.num_vertices(),
            triangles: mesh.num_triangles(),
            min_depth,
            max_depth,
        };

        info!(
            vertices = stats.vertices,
            triangles = stats.triangles,
            min_depth = stats.min_depth,
            max_depth = stats.max_depth,
            "Mesh built"
        );

        self.mesh = mesh;
        self.texture = Some(rgb.to_rgb8());
        self.intrinsics = Some(intrinsics);
        self.stats = stats;
        Ok(())
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// RGB8 source texture, `None` before a successful build
    pub fn texture(&self) -> Option<&RgbImage> {
        self.texture.as_ref()
    }

    /// Source intrinsics with the depth map's resolution
    pub fn intrinsics(&self) -> Option<&Intrinsics> {
        self.intrinsics.as_ref()
    }

    pub fn stats(&self) -> MeshStats {
        self.stats
    }

    pub fn is_valid(&self) -> bool {
        !self.mesh.is_empty() && self.texture.is_some()
    }

    pub fn clear(&mut self) {
        self.mesh.clear();
        self.texture = None;
        self.intrinsics = None;
        self.stats = MeshStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([90])))
    }

    #[test]
    fn test_build_converts_texture_and_overrides_size() {
        let mut dm = DepthMesh::new();
        let k = Intrinsics::new(40.0, 40.0, 4.0, 3.0, 999, 999);
        dm.build(&gray(8, 6), &DepthMap::filled(8, 6, 2.0), &k, DepthThresholds::default())
            .unwrap();

        assert!(dm.is_valid());
        let tex = dm.texture().unwrap();
        assert_eq!(tex.dimensions(), (8, 6));
        assert_eq!(tex.get_pixel(0, 0).0, [90, 90, 90]);
        let k = dm.intrinsics().unwrap();
        assert_eq!((k.width, k.height), (8, 6));

        let stats = dm.stats();
        assert_eq!(stats.vertices, 48);
        assert_eq!(stats.triangles, 2 * 7 * 5);
        assert_eq!((stats.min_depth, stats.max_depth), (2.0, 2.0));
    }

    #[test]
    fn test_failed_build_leaves_nothing_behind() {
        let mut dm = DepthMesh::new();
        let k = Intrinsics::centered(40.0, 40.0, 8, 6);
        dm.build(&gray(8, 6), &DepthMap::filled(8, 6, 2.0), &k, DepthThresholds::default())
            .unwrap();

        let err = dm
            .build(&gray(8, 5), &DepthMap::filled(8, 6, 2.0), &k, DepthThresholds::default())
            .unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
        assert!(!dm.is_valid());
        assert!(dm.mesh().vertices.is_empty());
        assert!(dm.texture().is_none());
    }

    #[test]
    fn test_all_invalid_depth_fails() {
        let mut dm = DepthMesh::new();
        let k = Intrinsics::centered(40.0, 40.0, 4, 4);
        let err = dm
            .build(&gray(4, 4), &DepthMap::filled(4, 4, 0.0), &k, DepthThresholds::default())
            .unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
    }
}
