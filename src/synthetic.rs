// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic RGB-D frames for demos and tests

use crate::constants::synthetic::{DISC_BULGE, SCENE_BACKGROUND_DEPTH};
use crate::errors::AppError;
use crate::mesh::DepthMap;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A color image and its registered metric depth map
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub rgb: RgbImage,
    pub depth: DepthMap,
}

/// Which synthetic frame to generate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    /// Rounded disc in front of a flat background
    Disc,
    /// Ground plane, two spheres and a box in front of a far wall
    #[default]
    Composed,
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneKind::Disc => write!(f, "disc"),
            SceneKind::Composed => write!(f, "composed"),
        }
    }
}

impl FromStr for SceneKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disc" => Ok(SceneKind::Disc),
            "composed" | "complex" => Ok(SceneKind::Composed),
            other => Err(AppError::Config(format!("unknown scene '{}'", other))),
        }
    }
}

impl SceneKind {
    pub fn generate(self, width: u32, height: u32, background: f32, foreground: f32) -> SyntheticFrame {
        match self {
            SceneKind::Disc => disc_scene(width, height, background, foreground),
            SceneKind::Composed => composed_scene(width, height),
        }
    }
}

/// Horizontal red-to-blue gradient
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |u, _| {
        let t = u as f32 / width as f32;
        Rgb([(255.0 * t) as u8, 128, (255.0 * (1.0 - t)) as u8])
    })
}

/// Disc of radius `min(w, h) / 4` centered in the frame over a flat plane
///
/// The disc bulges toward the camera: its depth is `foreground` at the rim
/// and `foreground - 0.5` at the center.
pub fn disc_scene(width: u32, height: u32, background: f32, foreground: f32) -> SyntheticFrame {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = width.min(height) as f32 / 4.0;

    let depth = DepthMap::from_fn(width, height, |u, v| {
        let dx = u as f32 - cx;
        let dy = v as f32 - cy;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < radius {
            let bulge = (radius * radius - dist * dist).sqrt() / radius;
            foreground - bulge * DISC_BULGE
        } else {
            background
        }
    });

    SyntheticFrame {
        rgb: gradient_image(width, height),
        depth,
    }
}

/// Far wall, receding ground plane, two spheres and a box
pub fn composed_scene(width: u32, height: u32) -> SyntheticFrame {
    SyntheticFrame {
        rgb: RgbImage::from_fn(width, height, |u, v| Rgb(composed_pixel(u, v, width, height).1)),
        depth: DepthMap::from_fn(width, height, |u, v| composed_pixel(u, v, width, height).0),
    }
}

fn composed_pixel(u: u32, v: u32, width: u32, height: u32) -> (f32, [u8; 3]) {
    let w = width as f32;
    let h = height as f32;
    let x = u as f32 - w / 2.0;
    let y = v as f32 - h / 2.0;

    let mut z = SCENE_BACKGROUND_DEPTH;
    let mut color = [100, 100, 150];

    if v > height / 2 {
        z = (SCENE_BACKGROUND_DEPTH - 2.0 * (v as f32 - h / 2.0) / h).max(1.5);
        color = [80, 120, 80];
    }

    // Left sphere overrides the background outright
    if let Some(offset) = sphere_offset(x, y, -w / 4.0, 0.0, h / 5.0) {
        z = 3.0 - offset * 0.8;
        color = [200, 50, 50];
    }

    if let Some(offset) = sphere_offset(x, y, w / 4.0, h / 8.0, h / 6.0) {
        let sphere_z = 2.0 - offset * 0.6;
        if sphere_z < z {
            z = sphere_z;
            color = [50, 50, 200];
        }
    }

    let in_box = x.abs() < w / 8.0 && (y - h / 4.0).abs() < h / 6.0;
    if in_box && 4.0 < z {
        z = 4.0;
        color = [200, 200, 50];
    }

    (z, color)
}

/// Normalized height of a sphere cap at `(x, y)`, `None` outside the sphere
fn sphere_offset(x: f32, y: f32, center_x: f32, center_y: f32, radius: f32) -> Option<f32> {
    let dx = x - center_x;
    let dy = y - center_y;
    let dist = (dx * dx + dy * dy).sqrt();
    (dist < radius).then(|| (radius * radius - dist * dist).sqrt() / radius)
}
