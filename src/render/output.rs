// SPDX-License-Identifier: GPL-3.0-only

//! Readback assembly: native raster layouts to the public output buffers

use crate::constants::METRIC_DEPTH_CLEAR;
use crate::errors::{AppError, AppResult};
use image::{GrayImage, RgbImage};

/// Row order of a raster as it comes back from the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterOrigin {
    /// Row 0 is the top image row (wgpu)
    TopLeft,
    /// Row 0 is the bottom image row (GL convention)
    BottomLeft,
}

/// Result of one render: color, metric depth and validity mask
///
/// All buffers are row-major with a top-left origin. `mask[i]` is 1 where a
/// depth-test-winning triangle covered the pixel and 0 elsewhere; where it is
/// 0, `rgb` holds zeros and `depth` holds [`METRIC_DEPTH_CLEAR`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    /// HxWx3 RGB
    pub rgb: Vec<u8>,
    /// HxW metric depth (meters)
    pub depth: Vec<f32>,
    /// HxW validity mask (0/1)
    pub mask: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RenderOutput {
    /// Output of the given size holding clear values
    pub fn cleared(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            rgb: vec![0; pixels * 3],
            depth: vec![METRIC_DEPTH_CLEAR; pixels],
            mask: vec![0; pixels],
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.mask[self.index(x, y)] != 0
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[self.index(x, y)]
    }

    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.index(x, y) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }

    /// Number of covered pixels
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m != 0).count()
    }

    pub fn valid_fraction(&self) -> f32 {
        if self.mask.is_empty() {
            return 0.0;
        }
        self.valid_count() as f32 / self.mask.len() as f32
    }

    /// Metric depth range over covered pixels
    pub fn depth_range(&self) -> Option<(f32, f32)> {
        self.depth
            .iter()
            .zip(&self.mask)
            .filter(|&(_, &m)| m != 0)
            .map(|(&z, _)| z)
            .fold(None, |acc, z| match acc {
                None => Some((z, z)),
                Some((lo, hi)) => Some((lo.min(z), hi.max(z))),
            })
    }

    pub fn to_rgb_image(&self) -> AppResult<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.rgb.clone())
            .ok_or_else(|| AppError::Io("RGB buffer does not match output size".into()))
    }

    /// Mask as an 8-bit image with 0/255
    pub fn mask_image(&self) -> AppResult<GrayImage> {
        let data = self.mask.iter().map(|&m| if m != 0 { 255 } else { 0 }).collect();
        GrayImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| AppError::Io("mask buffer does not match output size".into()))
    }
}

/// Assemble a [`RenderOutput`] from tightly packed native rasters
///
/// * `color_rgba` - RGBA8 color attachment (alpha is dropped)
/// * `metric_depth` - R32F camera-space Z attachment
/// * `mask` - R8 unorm attachment (any non-zero value means covered)
///
/// Rows are flipped when the rasterizer's origin is bottom-left so that every
/// buffer ends up top-left-origin like the input depth map.
pub fn assemble_output(
    width: u32,
    height: u32,
    origin: RasterOrigin,
    color_rgba: &[u8],
    metric_depth: &[f32],
    mask: &[u8],
) -> AppResult<RenderOutput> {
    let w = width as usize;
    let h = height as usize;
    let pixels = w * h;

    if color_rgba.len() != pixels * 4 || metric_depth.len() != pixels || mask.len() != pixels {
        return Err(AppError::render(format!(
            "readback size mismatch for {}x{}: color {} bytes, depth {} samples, mask {} bytes",
            width,
            height,
            color_rgba.len(),
            metric_depth.len(),
            mask.len()
        )));
    }

    let mut output = RenderOutput::cleared(width, height);

    for y in 0..h {
        let src_y = match origin {
            RasterOrigin::TopLeft => y,
            RasterOrigin::BottomLeft => h - 1 - y,
        };
        let src_row = src_y * w;
        let dst_row = y * w;

        for x in 0..w {
            let src = src_row + x;
            let dst = dst_row + x;
            output.rgb[dst * 3..dst * 3 + 3].copy_from_slice(&color_rgba[src * 4..src * 4 + 3]);
            output.depth[dst] = metric_depth[src];
            output.mask[dst] = u8::from(mask[src] != 0);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasters() -> (Vec<u8>, Vec<f32>, Vec<u8>) {
        // 2x2, bottom-left origin: row 0 = bottom
        let color = vec![
            1, 2, 3, 255, 4, 5, 6, 255, //
            7, 8, 9, 255, 10, 11, 12, 255,
        ];
        let depth = vec![1.0, 2.0, 3.0, 4.0];
        let mask = vec![255, 0, 255, 255];
        (color, depth, mask)
    }

    #[test]
    fn test_bottom_left_rows_are_flipped() {
        let (c, d, m) = rasters();
        let out = assemble_output(2, 2, RasterOrigin::BottomLeft, &c, &d, &m).unwrap();
        assert_eq!(out.rgb, vec![7, 8, 9, 10, 11, 12, 1, 2, 3, 4, 5, 6]);
        assert_eq!(out.depth, vec![3.0, 4.0, 1.0, 2.0]);
        assert_eq!(out.mask, vec![1, 1, 1, 0]);
    }

    #[test]
    fn test_top_left_rows_are_kept() {
        let (c, d, m) = rasters();
        let out = assemble_output(2, 2, RasterOrigin::TopLeft, &c, &d, &m).unwrap();
        assert_eq!(out.rgb, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(out.depth, d);
        assert_eq!(out.mask, vec![1, 0, 1, 1]);
        assert_eq!(out.rgb_at(1, 1), [10, 11, 12]);
    }

    #[test]
    fn test_size_mismatch_is_a_render_failure() {
        let (c, d, m) = rasters();
        let err = assemble_output(3, 2, RasterOrigin::TopLeft, &c, &d, &m).unwrap_err();
        assert!(matches!(err, AppError::Render(_)));
    }

    #[test]
    fn test_statistics() {
        let (c, d, m) = rasters();
        let out = assemble_output(2, 2, RasterOrigin::TopLeft, &c, &d, &m).unwrap();
        assert_eq!(out.valid_count(), 3);
        assert_eq!(out.valid_fraction(), 0.75);
        assert_eq!(out.depth_range(), Some((1.0, 4.0)));
        assert_eq!(RenderOutput::cleared(4, 4).depth_range(), None);
    }

    #[test]
    fn test_mask_image_is_binary_255() {
        let (c, d, m) = rasters();
        let out = assemble_output(2, 2, RasterOrigin::TopLeft, &c, &d, &m).unwrap();
        let img = out.mask_image().unwrap();
        assert_eq!(img.as_raw(), &vec![255, 0, 255, 255]);
        let rgb = out.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(1, 1).0, [10, 11, 12]);
    }
}
