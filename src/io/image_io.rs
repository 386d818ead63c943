// SPDX-License-Identifier: GPL-3.0-only

//! Color and mask image files

use crate::errors::{AppError, AppResult};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;
use tracing::debug;

/// Load any supported image format
pub fn load_rgb(path: &Path) -> AppResult<DynamicImage> {
    let image = image::open(path)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(AppError::input(format!("empty image: {}", path.display())));
    }
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        color = ?image.color(),
        "Loaded color image"
    );
    Ok(image)
}

/// Save an interleaved RGB8 buffer
pub fn save_rgb(path: &Path, rgb: &[u8], width: u32, height: u32) -> AppResult<()> {
    let image = RgbImage::from_raw(width, height, rgb.to_vec()).ok_or_else(|| {
        AppError::input(format!(
            "RGB buffer has {} bytes, expected {}x{}x3",
            rgb.len(),
            width,
            height
        ))
    })?;
    image.save(path)?;
    Ok(())
}

/// Save a 0/1 mask as an 8-bit image with 0/255
pub fn save_mask(path: &Path, mask: &[u8], width: u32, height: u32) -> AppResult<()> {
    let data = mask.iter().map(|&m| if m != 0 { 255 } else { 0 }).collect();
    let image = GrayImage::from_raw(width, height, data).ok_or_else(|| {
        AppError::input(format!(
            "mask has {} bytes, expected {}x{}",
            mask.len(),
            width,
            height
        ))
    })?;
    image.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        let data = vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 9, 9, 9];
        save_rgb(&path, &data, 2, 2).unwrap();

        let loaded = load_rgb(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (2, 2));
        assert_eq!(loaded.as_raw(), &data);
    }

    #[test]
    fn test_mask_written_as_0_255() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        save_mask(&path, &[0, 1, 1, 0], 2, 2).unwrap();

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.as_raw(), &vec![0, 255, 255, 0]);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_rgb(&dir.path().join("x.png"), &[0; 5], 2, 2).unwrap_err();
        assert!(matches!(err, AppError::InputValidation(_)));
        assert!(save_mask(&dir.path().join("m.png"), &[0; 3], 2, 2).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_rgb(Path::new("/nonexistent/rgb.png")),
            Err(AppError::Io(_))
        ));
    }
}
