// SPDX-License-Identifier: GPL-3.0-only

//! Depth map loading and saving

use super::npy;
use crate::constants::DEPTH_PNG_SCALE;
use crate::errors::{AppError, AppResult};
use crate::mesh::{DepthMap, is_valid_depth};
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgb32FImage};
use std::path::Path;
use tracing::debug;

/// Load a depth map and convert it to meters with `scale`
///
/// The format is chosen by extension: `.npy` (float32/float64), `.exr`
/// (first channel) and anything else through `image` (first channel of an
/// 8/16-bit or float image).
pub fn load_depth(path: &Path, scale: f32) -> AppResult<DepthMap> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mut depth = if ext == "npy" {
        load_depth_npy(path)?
    } else {
        let image = image::open(path)?;
        depth_from_image(image)?
    };

    if scale != 1.0 {
        depth.scale(scale);
    }

    debug!(
        path = %path.display(),
        width = depth.width(),
        height = depth.height(),
        scale,
        "Loaded depth"
    );
    Ok(depth)
}

pub fn load_depth_npy(path: &Path) -> AppResult<DepthMap> {
    let bytes = std::fs::read(path)?;
    let (width, height, data) = npy::decode_f32(&bytes)?;
    DepthMap::new(width, height, data)
}

/// First channel of a decoded image, as raw (unscaled) values
pub fn depth_from_image(image: DynamicImage) -> AppResult<DepthMap> {
    let (width, height) = (image.width(), image.height());
    let data: Vec<f32> = match image {
        DynamicImage::ImageLuma8(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageLumaA8(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageRgb8(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageRgba8(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageLuma16(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageLumaA16(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageRgb16(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageRgba16(b) => b.pixels().map(|p| p.0[0] as f32).collect(),
        DynamicImage::ImageRgb32F(b) => b.pixels().map(|p| p.0[0]).collect(),
        DynamicImage::ImageRgba32F(b) => b.pixels().map(|p| p.0[0]).collect(),
        other => {
            return Err(AppError::input(format!(
                "unsupported depth image format {:?}",
                other.color()
            )));
        }
    };
    DepthMap::new(width, height, data)
}

/// Save float depth as OpenEXR (value replicated in R, G and B)
pub fn save_depth_exr(path: &Path, depth: &[f32], width: u32, height: u32) -> AppResult<()> {
    check_len(depth.len(), width, height)?;
    let rgb: Vec<f32> = depth.iter().flat_map(|&z| [z, z, z]).collect();
    let image: Rgb32FImage = ImageBuffer::<Rgb<f32>, _>::from_raw(width, height, rgb)
        .ok_or_else(|| AppError::Io("depth buffer does not match image size".into()))?;
    DynamicImage::ImageRgb32F(image).save(path)?;
    Ok(())
}

/// Save depth as 16-bit PNG in millimeters (invalid depth written as 0)
pub fn save_depth_png(path: &Path, depth: &[f32], width: u32, height: u32) -> AppResult<()> {
    check_len(depth.len(), width, height)?;
    let data = depth_to_u16(depth, DEPTH_PNG_SCALE);
    let image = ImageBuffer::<Luma<u16>, _>::from_raw(width, height, data)
        .ok_or_else(|| AppError::Io("depth buffer does not match image size".into()))?;
    image.save(path)?;
    Ok(())
}

pub fn save_depth_npy(path: &Path, depth: &[f32], width: u32, height: u32) -> AppResult<()> {
    let bytes = npy::encode_f32(depth, width, height)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Quantize metric depth: `z * scale` truncated and clamped to `u16`
pub fn depth_to_u16(depth: &[f32], scale: f32) -> Vec<u16> {
    depth
        .iter()
        .map(|&z| {
            if is_valid_depth(z) {
                (z * scale).min(u16::MAX as f32) as u16
            } else {
                0
            }
        })
        .collect()
}

fn check_len(len: usize, width: u32, height: u32) -> AppResult<()> {
    if len != width as usize * height as usize {
        return Err(AppError::input(format!(
            "depth buffer has {} samples, expected {}x{}",
            len, width, height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::GrayImage;

    #[test]
    fn test_depth_to_u16() {
        let depth = [1.2345, 0.0, f32::NAN, -1.0, 70.0, 0.0005];
        assert_eq!(depth_to_u16(&depth, 1000.0), vec![1234, 0, 0, 0, 65535, 0]);
    }

    #[test]
    fn test_png_round_trip_in_millimeters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.png");
        save_depth_png(&path, &[1.5, 0.0, 2.25, 3.0], 2, 2).unwrap();

        let depth = load_depth(&path, 0.001).unwrap();
        assert_eq!((depth.width(), depth.height()), (2, 2));
        assert_relative_eq!(depth.get(0, 0), 1.5, epsilon = 1e-6);
        assert_eq!(depth.get(1, 0), 0.0);
        assert_relative_eq!(depth.get(0, 1), 2.25, epsilon = 1e-6);
    }

    #[test]
    fn test_npy_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.NPY");
        let data = vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0];
        save_depth_npy(&path, &data, 3, 2).unwrap();

        let depth = load_depth(&path, 2.0).unwrap();
        assert_eq!((depth.width(), depth.height()), (3, 2));
        assert_eq!(depth.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_exr_keeps_float_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth.exr");
        let data = vec![1.234_567, 0.0, 42.5, 0.001];
        save_depth_exr(&path, &data, 2, 2).unwrap();

        let depth = load_depth(&path, 1.0).unwrap();
        for (loaded, expected) in depth.as_slice().iter().zip(&data) {
            assert_relative_eq!(*loaded, *expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_eight_bit_depth_uses_first_channel() {
        let image = GrayImage::from_raw(2, 1, vec![10, 200]).unwrap();
        let depth = depth_from_image(DynamicImage::ImageLuma8(image)).unwrap();
        assert_eq!(depth.as_slice(), &[10.0, 200.0]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_depth(Path::new("/nonexistent/depth.png"), 1.0).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
        let err = load_depth(Path::new("/nonexistent/depth.npy"), 1.0).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_depth_png(&dir.path().join("d.png"), &[1.0; 3], 2, 2).is_err());
        assert!(save_depth_exr(&dir.path().join("d.exr"), &[1.0; 3], 2, 2).is_err());
    }
}
