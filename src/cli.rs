// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Re-rendering an RGB-D frame at several focal scales
//! - Writing a synthetic sample frame
//! - Reporting the GPU the renderer would use

use clap::Args;
use image::DynamicImage;
use rgbd_rerender::config::{Config, parse_focal_list};
use rgbd_rerender::errors::AppResult;
use rgbd_rerender::io::{self, depth_io};
use rgbd_rerender::mesh::EdgeBreakMode;
use rgbd_rerender::render::{Backend, create_surface};
use rgbd_rerender::synthetic::SceneKind;
use rgbd_rerender::{GpuContext, Rerenderer};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Flags of the `render` command; each one overrides the config file
#[derive(Args, Debug, Default)]
pub struct RenderArgs {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Color image
    #[arg(long)]
    pub rgb: Option<PathBuf>,

    /// Depth map (.npy, .exr, 16-bit .png, ...)
    #[arg(long)]
    pub depth: Option<PathBuf>,

    /// Output directory (default: ./output)
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Focal length X in pixels
    #[arg(long)]
    pub fx: Option<f32>,

    /// Focal length Y in pixels
    #[arg(long)]
    pub fy: Option<f32>,

    /// Principal point X (default: image center)
    #[arg(long, allow_negative_numbers = true)]
    pub cx: Option<f32>,

    /// Principal point Y (default: image center)
    #[arg(long, allow_negative_numbers = true)]
    pub cy: Option<f32>,

    /// Multiplier converting raw depth values to meters
    #[arg(long)]
    pub depth_scale: Option<f32>,

    /// Comma-separated focal scales, e.g. 0.5,1,2
    #[arg(long)]
    pub focal_list: Option<String>,

    /// Relative discontinuity threshold
    #[arg(long)]
    pub tau_rel: Option<f32>,

    /// Absolute discontinuity threshold in meters
    #[arg(long)]
    pub tau_abs: Option<f32>,

    /// Absolute threshold behavior (fixed, depth-scaled)
    #[arg(long)]
    pub edge_mode: Option<EdgeBreakMode>,

    /// Near clipping plane in meters
    #[arg(long)]
    pub near: Option<f32>,

    /// Far clipping plane in meters
    #[arg(long)]
    pub far: Option<f32>,

    /// GPU adapter index
    #[arg(long)]
    pub gpu: Option<usize>,

    /// Output width (default: source width)
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height (default: source height)
    #[arg(long)]
    pub height: Option<u32>,

    /// Rasterizer (auto, gpu, software)
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Save depth as EXR
    #[arg(long, conflicts_with = "no_exr")]
    pub save_exr: bool,

    /// Do not save depth as EXR
    #[arg(long)]
    pub no_exr: bool,

    /// Save depth as 16-bit PNG in millimeters
    #[arg(long, conflicts_with = "no_png_depth")]
    pub save_png_depth: bool,

    /// Do not save depth as 16-bit PNG
    #[arg(long)]
    pub no_png_depth: bool,

    /// Save depth as NPY
    #[arg(long)]
    pub save_npy: bool,
}

impl RenderArgs {
    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, config: &mut Config) -> AppResult<()> {
        if let Some(path) = &self.rgb {
            config.rgb_path = Some(path.clone());
        }
        if let Some(path) = &self.depth {
            config.depth_path = Some(path.clone());
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir = dir.clone();
        }
        if let Some(fx) = self.fx {
            config.fx = fx;
        }
        if let Some(fy) = self.fy {
            config.fy = fy;
        }
        if self.cx.is_some() {
            config.cx = self.cx;
        }
        if self.cy.is_some() {
            config.cy = self.cy;
        }
        if let Some(scale) = self.depth_scale {
            config.depth_scale = scale;
        }
        if let Some(list) = &self.focal_list {
            config.focal_scales = parse_focal_list(list)?;
        }
        if let Some(tau) = self.tau_rel {
            config.tau_rel = tau;
        }
        if let Some(tau) = self.tau_abs {
            config.tau_abs = tau;
        }
        if let Some(mode) = self.edge_mode {
            config.edge_mode = mode;
        }
        if let Some(near) = self.near {
            config.near = near;
        }
        if let Some(far) = self.far {
            config.far = far;
        }
        if self.gpu.is_some() {
            config.gpu_device = self.gpu;
        }
        if self.width.is_some() {
            config.output_width = self.width;
        }
        if self.height.is_some() {
            config.output_height = self.height;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.save_exr {
            config.save_exr = true;
        }
        if self.no_exr {
            config.save_exr = false;
        }
        if self.save_png_depth {
            config.save_png_depth = true;
        }
        if self.no_png_depth {
            config.save_png_depth = false;
        }
        if self.save_npy {
            config.save_npy = true;
        }
        Ok(())
    }
}

/// Re-render the input frame at every configured focal scale
pub fn render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    args.apply(&mut config)?;
    config.validate()?;
    config.log_summary();

    let (Some(rgb_path), Some(depth_path)) = (&config.rgb_path, &config.depth_path) else {
        return Err("RGB and depth paths are required".into());
    };

    io::ensure_output_dir(&config.output_dir)?;

    let rgb = io::load_rgb(rgb_path)?;
    let depth = io::load_depth(depth_path, config.depth_scale)?;
    let source = config.source_intrinsics(depth.width(), depth.height());
    info!(
        width = depth.width(),
        height = depth.height(),
        fx = source.fx,
        fy = source.fy,
        cx = source.cx,
        cy = source.cy,
        "Loaded RGB-D frame"
    );

    let surface = create_surface(config.backend, config.gpu_device)?;
    let mut driver = Rerenderer::new(surface, config.render_settings());
    driver.prepare(&rgb, &depth, &source, config.thresholds())?;

    let options = config.output_options();
    let output_dir = config.output_dir.clone();
    let rendered = driver.render_each(&config.focal_scales, |frame| {
        io::save_outputs(&output_dir, frame.scale, &frame.output, &options);
    })?;

    println!();
    println!(
        "Done: rendered {}/{} focal scales in {:.2}s",
        rendered,
        config.focal_scales.len(),
        start.elapsed().as_secs_f64()
    );
    println!("Output: {}", output_dir.display());

    Ok(())
}

/// Write a synthetic RGB-D pair and print how to render it
pub fn sample(
    out_dir: &Path,
    width: u32,
    height: u32,
    scene: SceneKind,
) -> Result<(), Box<dyn std::error::Error>> {
    use rgbd_rerender::constants::synthetic::{BACKGROUND_DEPTH, FOREGROUND_DEPTH};

    if width == 0 || height == 0 {
        return Err("sample size must be non-empty".into());
    }

    io::ensure_output_dir(out_dir)?;
    let frame = scene.generate(width, height, BACKGROUND_DEPTH, FOREGROUND_DEPTH);

    let rgb_path = out_dir.join("sample_rgb.png");
    DynamicImage::ImageRgb8(frame.rgb).save(&rgb_path)?;
    println!("Saved: {}", rgb_path.display());

    let png_path = out_dir.join("sample_depth.png");
    depth_io::save_depth_png(&png_path, frame.depth.as_slice(), width, height)?;
    println!("Saved: {}", png_path.display());

    let npy_path = out_dir.join("sample_depth.npy");
    depth_io::save_depth_npy(&npy_path, frame.depth.as_slice(), width, height)?;
    println!("Saved: {}", npy_path.display());

    println!();
    println!("Example usage:");
    println!(
        "  rgbd-rerender render --rgb {} --depth {} --fx 500 --fy 500 --focal-list 0.5,0.75,1.0,1.5,2.0 --out-dir output",
        rgb_path.display(),
        npy_path.display()
    );
    println!();
    println!("Or with depth in millimeters:");
    println!(
        "  rgbd-rerender render --rgb {} --depth {} --depth-scale 0.001 --fx 500 --fy 500",
        rgb_path.display(),
        png_path.display()
    );

    Ok(())
}

/// Print the GPU context `render` would create
pub fn info(gpu: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    match GpuContext::initialize(gpu) {
        Ok(context) => {
            let device_info = context.info();
            println!("Adapter:  {}", device_info.adapter_name);
            println!("Backend:  {:?}", device_info.backend);
            println!("Type:     {:?}", device_info.device_type);
            println!("Limits:   {}", device_info.limits_tier);
            println!("Max size: {}", context.max_texture_dimension());
            context.destroy();
        }
        Err(e) => {
            println!("No GPU available ({})", e);
            println!("The software rasterizer will be used with --backend auto or software.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        let args = RenderArgs {
            rgb: Some("a.png".into()),
            fx: Some(400.0),
            cx: Some(-1.0),
            focal_list: Some("1,2".into()),
            width: Some(320),
            height: Some(240),
            no_exr: true,
            save_npy: true,
            backend: Some(Backend::Software),
            ..Default::default()
        };
        args.apply(&mut config).unwrap();

        assert_eq!(config.rgb_path, Some(PathBuf::from("a.png")));
        assert_eq!(config.fx, 400.0);
        assert_eq!(config.fy, 525.0);
        assert_eq!(config.cx, Some(-1.0));
        assert_eq!(config.focal_scales, vec![1.0, 2.0]);
        assert_eq!((config.output_width, config.output_height), (Some(320), Some(240)));
        assert!(!config.save_exr && config.save_png_depth && config.save_npy);
        assert_eq!(config.backend, Backend::Software);
    }

    #[test]
    fn test_bad_focal_list_is_rejected() {
        let args = RenderArgs {
            focal_list: Some("1,x".into()),
            ..Default::default()
        };
        assert!(args.apply(&mut Config::default()).is_err());
    }
}
