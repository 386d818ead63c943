// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::{AppError, AppResult};

/// Dense row-major metric depth map (meters)
///
/// Invalid samples are stored as non-finite or non-positive values.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> AppResult<Self> {
        if data.len() != width as usize * height as usize {
            return Err(AppError::input(format!(
                "depth data has {} samples, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Depth map with every sample set to `depth`
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width,
            height,
            data: vec![depth; width as usize * height as usize],
        }
    }

    /// Build from a per-pixel function of `(u, v)`
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for v in 0..height {
            for u in 0..width {
                data.push(f(u, v));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, u: u32, v: u32) -> f32 {
        self.data[v as usize * self.width as usize + u as usize]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Multiply every sample by `scale` (raw units to meters)
    pub fn scale(&mut self, scale: f32) {
        if scale != 1.0 {
            self.data.iter_mut().for_each(|z| *z *= scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(DepthMap::new(4, 4, vec![1.0; 15]).is_err());
        assert!(DepthMap::new(4, 4, vec![1.0; 16]).is_ok());
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let d = DepthMap::from_fn(3, 2, |u, v| (v * 10 + u) as f32);
        assert_eq!(d.as_slice(), &[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(d.get(2, 1), 12.0);
    }

    #[test]
    fn test_scale() {
        let mut d = DepthMap::filled(2, 2, 1500.0);
        d.scale(0.001);
        assert!(d.as_slice().iter().all(|&z| (z - 1.5).abs() < 1e-6));
    }
}
