// SPDX-License-Identifier: GPL-3.0-only

//! Input loading and output writing
//!
//! Output files for one focal scale are named
//! `scale_{s:.2}_{rgb|depth|mask}.{png|exr|npy}` inside the output directory.

pub mod depth_io;
pub mod image_io;
pub mod npy;

pub use depth_io::{load_depth, save_depth_exr, save_depth_npy, save_depth_png};
pub use image_io::{load_rgb, save_mask, save_rgb};

use crate::errors::AppResult;
use crate::render::RenderOutput;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which depth encodings to write next to the color and mask images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub save_exr: bool,
    pub save_png_depth: bool,
    pub save_npy: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            save_exr: true,
            save_png_depth: true,
            save_npy: false,
        }
    }
}

/// One file written for a rendered scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Rgb,
    DepthExr,
    DepthPng,
    DepthNpy,
    Mask,
}

impl OutputKind {
    fn suffix(self) -> &'static str {
        match self {
            OutputKind::Rgb => "rgb.png",
            OutputKind::DepthExr => "depth.exr",
            OutputKind::DepthPng => "depth.png",
            OutputKind::DepthNpy => "depth.npy",
            OutputKind::Mask => "mask.png",
        }
    }
}

/// File name prefix for a focal scale, e.g. `scale_0.50`
pub fn scale_prefix(scale: f32) -> String {
    format!("scale_{:.2}", scale)
}

pub fn output_path(dir: &Path, scale: f32, kind: OutputKind) -> PathBuf {
    dir.join(format!("{}_{}", scale_prefix(scale), kind.suffix()))
}

/// Create the output directory if missing
pub fn ensure_output_dir(dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Write every enabled output for one scale
///
/// A file that fails to save is logged and skipped; the paths that were
/// written are returned.
pub fn save_outputs(
    dir: &Path,
    scale: f32,
    output: &RenderOutput,
    options: &OutputOptions,
) -> Vec<PathBuf> {
    let (w, h) = (output.width, output.height);
    let mut kinds = vec![OutputKind::Rgb];
    if options.save_exr {
        kinds.push(OutputKind::DepthExr);
    }
    if options.save_png_depth {
        kinds.push(OutputKind::DepthPng);
    }
    if options.save_npy {
        kinds.push(OutputKind::DepthNpy);
    }
    kinds.push(OutputKind::Mask);

    let mut saved = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let path = output_path(dir, scale, kind);
        let result = match kind {
            OutputKind::Rgb => save_rgb(&path, &output.rgb, w, h),
            OutputKind::DepthExr => save_depth_exr(&path, &output.depth, w, h),
            OutputKind::DepthPng => save_depth_png(&path, &output.depth, w, h),
            OutputKind::DepthNpy => save_depth_npy(&path, &output.depth, w, h),
            OutputKind::Mask => save_mask(&path, &output.mask, w, h),
        };
        match result {
            Ok(()) => {
                info!(path = %path.display(), "Saved");
                saved.push(path);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save output"),
        }
    }
    saved
}
