// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Default focal length X (pixels)
pub const DEFAULT_FX: f32 = 525.0;
/// Default focal length Y (pixels)
pub const DEFAULT_FY: f32 = 525.0;

/// Default focal scale factors rendered when none are configured
pub const DEFAULT_FOCAL_SCALES: [f32; 5] = [0.5, 0.75, 1.0, 1.5, 2.0];

/// Relative depth discontinuity threshold (5%)
pub const DEFAULT_TAU_REL: f32 = 0.05;
/// Absolute depth discontinuity threshold (meters)
pub const DEFAULT_TAU_ABS: f32 = 0.1;

/// Near clipping plane (meters)
pub const DEFAULT_NEAR: f32 = 0.1;
/// Far clipping plane (meters)
pub const DEFAULT_FAR: f32 = 100.0;

/// Raw depth units to meters (1.0 = input already in meters)
pub const DEFAULT_DEPTH_SCALE: f32 = 1.0;

/// Meters to 16-bit PNG units (millimeters)
pub const DEPTH_PNG_SCALE: f32 = 1000.0;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Value written to the metric depth raster where nothing was drawn
pub const METRIC_DEPTH_CLEAR: f32 = 0.0;

/// Synthetic scene defaults
pub mod synthetic {
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;
    pub const BACKGROUND_DEPTH: f32 = 5.0;
    pub const FOREGROUND_DEPTH: f32 = 2.0;
    /// Bulge of the disc toward the camera at its center (meters)
    pub const DISC_BULGE: f32 = 0.5;
    /// Far wall of the composed scene (meters)
    pub const SCENE_BACKGROUND_DEPTH: f32 = 8.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_planes_ordered() {
        assert!(DEFAULT_NEAR > 0.0);
        assert!(DEFAULT_NEAR < DEFAULT_FAR);
    }

    #[test]
    fn test_default_scales_positive() {
        assert!(DEFAULT_FOCAL_SCALES.iter().all(|&s| s > 0.0));
    }
}
