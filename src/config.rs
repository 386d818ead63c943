// SPDX-License-Identifier: GPL-3.0-only

//! Run configuration
//!
//! Loaded from an optional JSON file, then overridden by command-line flags.
//! Every field has a default so partial files are accepted.

use crate::constants::{
    DEFAULT_DEPTH_SCALE, DEFAULT_FAR, DEFAULT_FOCAL_SCALES, DEFAULT_FX, DEFAULT_FY, DEFAULT_NEAR,
    DEFAULT_OUTPUT_DIR, DEFAULT_TAU_ABS, DEFAULT_TAU_REL,
};
use crate::errors::{AppError, AppResult};
use crate::geometry::Intrinsics;
use crate::io::OutputOptions;
use crate::mesh::{DepthThresholds, EdgeBreakMode};
use crate::pipelines::RenderSettings;
use crate::render::Backend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Color image
    pub rgb_path: Option<PathBuf>,
    /// Depth map (`.npy`, `.exr` or an image format)
    pub depth_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Source focal lengths (pixels)
    pub fx: f32,
    pub fy: f32,
    /// Source principal point; absent or negative means the image center
    pub cx: Option<f32>,
    pub cy: Option<f32>,
    /// Raw depth units to meters
    pub depth_scale: f32,
    pub focal_scales: Vec<f32>,
    /// Output resolution; both absent renders at the source resolution
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub tau_rel: f32,
    pub tau_abs: f32,
    pub edge_mode: EdgeBreakMode,
    pub near: f32,
    pub far: f32,
    /// Adapter index from enumeration order; absent picks automatically
    pub gpu_device: Option<usize>,
    pub backend: Backend,
    pub save_exr: bool,
    pub save_png_depth: bool,
    pub save_npy: bool,
}

impl Default for Config {
    fn default() -> Self {
        let outputs = OutputOptions::default();
        Self {
            rgb_path: None,
            depth_path: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            fx: DEFAULT_FX,
            fy: DEFAULT_FY,
            cx: None,
            cy: None,
            depth_scale: DEFAULT_DEPTH_SCALE,
            focal_scales: DEFAULT_FOCAL_SCALES.to_vec(),
            output_width: None,
            output_height: None,
            tau_rel: DEFAULT_TAU_REL,
            tau_abs: DEFAULT_TAU_ABS,
            edge_mode: EdgeBreakMode::default(),
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            gpu_device: None,
            backend: Backend::default(),
            save_exr: outputs.save_exr,
            save_png_depth: outputs.save_png_depth,
            save_npy: outputs.save_npy,
        }
    }
}

impl Config {
    /// Read a JSON configuration file
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Check every value before any work starts
    pub fn validate(&self) -> AppResult<()> {
        if self.rgb_path.is_none() {
            return Err(AppError::Config("RGB image path is required".into()));
        }
        if self.depth_path.is_none() {
            return Err(AppError::Config("depth map path is required".into()));
        }
        if !(self.fx > 0.0 && self.fy > 0.0) {
            return Err(AppError::Config(format!(
                "focal lengths must be positive (fx={}, fy={})",
                self.fx, self.fy
            )));
        }
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(AppError::Config(format!(
                "depth scale must be positive ({})",
                self.depth_scale
            )));
        }
        if self.focal_scales.is_empty() {
            return Err(AppError::Config("at least one focal scale is required".into()));
        }
        if let Some(bad) = self.focal_scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(AppError::Config(format!("focal scale must be positive ({})", bad)));
        }
        self.thresholds().validate()?;
        if !(self.near > 0.0 && self.far.is_finite() && self.near < self.far) {
            return Err(AppError::Config(format!(
                "invalid near/far planes (near={}, far={})",
                self.near, self.far
            )));
        }
        if self.output_width == Some(0) || self.output_height == Some(0) {
            return Err(AppError::Config(format!(
                "output width and height must be positive ({:?}x{:?})",
                self.output_width, self.output_height
            )));
        }
        Ok(())
    }

    /// Source intrinsics for a depth map of `width x height`
    pub fn source_intrinsics(&self, width: u32, height: u32) -> Intrinsics {
        let center = |value: Option<f32>, extent: u32| {
            value
                .filter(|v| *v >= 0.0)
                .unwrap_or(extent as f32 / 2.0)
        };
        Intrinsics::new(
            self.fx,
            self.fy,
            center(self.cx, width),
            center(self.cy, height),
            width,
            height,
        )
    }

    pub fn thresholds(&self) -> DepthThresholds {
        DepthThresholds::new(self.tau_rel, self.tau_abs).with_mode(self.edge_mode)
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            near: self.near,
            far: self.far,
            output_width: self.output_width,
            output_height: self.output_height,
        }
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            save_exr: self.save_exr,
            save_png_depth: self.save_png_depth,
            save_npy: self.save_npy,
        }
    }

    /// Emit the resolved configuration
    pub fn log_summary(&self) {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into())
        };
        info!(
            rgb = %path(&self.rgb_path),
            depth = %path(&self.depth_path),
            output_dir = %self.output_dir.display(),
            "Inputs"
        );
        info!(
            fx = self.fx,
            fy = self.fy,
            cx = ?self.cx,
            cy = ?self.cy,
            depth_scale = self.depth_scale,
            "Source intrinsics"
        );
        info!(
            focal_scales = ?self.focal_scales,
            output_width = ?self.output_width,
            output_height = ?self.output_height,
            near = self.near,
            far = self.far,
            "Targets"
        );
        info!(
            tau_rel = self.tau_rel,
            tau_abs = self.tau_abs,
            edge_mode = %self.edge_mode,
            backend = %self.backend,
            gpu_device = ?self.gpu_device,
            "Rendering"
        );
    }
}

/// Parse a comma-separated list of focal scales (`"0.5,1,2"`)
pub fn parse_focal_list(list: &str) -> AppResult<Vec<f32>> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f32>()
                .map_err(|_| AppError::Config(format!("invalid focal scale '{}'", item)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            rgb_path: Some("rgb.png".into()),
            depth_path: Some("depth.npy".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.focal_scales, vec![0.5, 0.75, 1.0, 1.5, 2.0]);
        assert_eq!(config.fx, 525.0);
        assert!(config.save_exr && config.save_png_depth && !config.save_npy);
        assert_eq!(config.edge_mode, EdgeBreakMode::Fixed);
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c: &mut Config| c.rgb_path = None),
            Box::new(|c: &mut Config| c.depth_path = None),
            Box::new(|c: &mut Config| c.fx = 0.0),
            Box::new(|c: &mut Config| c.fy = -1.0),
            Box::new(|c: &mut Config| c.depth_scale = 0.0),
            Box::new(|c: &mut Config| c.focal_scales.clear()),
            Box::new(|c: &mut Config| c.focal_scales = vec![1.0, -0.5]),
            Box::new(|c: &mut Config| c.tau_rel = 0.0),
            Box::new(|c: &mut Config| c.tau_abs = -0.1),
            Box::new(|c: &mut Config| c.near = 0.0),
            Box::new(|c: &mut Config| {
                c.near = 10.0;
                c.far = 5.0
            }),
            Box::new(|c: &mut Config| c.output_height = Some(0)),
            Box::new(|c: &mut Config| {
                c.output_width = Some(0);
                c.output_height = Some(240)
            }),
        ];

        for (i, mutate) in cases.iter().enumerate() {
            let mut config = valid();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "case {i}: {err}");
        }
    }

    #[test]
    fn test_single_output_dimension_is_accepted() {
        let mut config = valid();
        config.output_width = Some(320);
        config.validate().unwrap();

        let source = config.source_intrinsics(640, 480);
        assert_eq!(config.render_settings().output_size(&source), Some((320, 480)));
    }

    #[test]
    fn test_principal_point_defaults_to_center() {
        let mut config = valid();
        let k = config.source_intrinsics(640, 480);
        assert_eq!((k.cx, k.cy), (320.0, 240.0));

        config.cx = Some(-1.0);
        config.cy = Some(100.0);
        let k = config.source_intrinsics(640, 480);
        assert_eq!((k.cx, k.cy), (320.0, 100.0));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "fx": 500.0, "focal_scales": [1.0, 2.0], "edge_mode": "depth-scaled", "backend": "software" }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.fx, 500.0);
        assert_eq!(config.fy, 525.0);
        assert_eq!(config.focal_scales, vec![1.0, 2.0]);
        assert_eq!(config.edge_mode, EdgeBreakMode::DepthScaled);
        assert_eq!(config.backend, Backend::Software);
    }

    #[test]
    fn test_load_reports_bad_json_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(AppError::Config(_))));
        assert!(matches!(
            Config::load(&dir.path().join("missing.json")),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_parse_focal_list() {
        assert_eq!(parse_focal_list("0.5, 1,2.0").unwrap(), vec![0.5, 1.0, 2.0]);
        assert_eq!(parse_focal_list("1.5,").unwrap(), vec![1.5]);
        assert!(parse_focal_list("1,abc").is_err());
    }
}
