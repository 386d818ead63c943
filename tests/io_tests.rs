// SPDX-License-Identifier: GPL-3.0-only

//! Files in, files out: config, depth formats and saved outputs

use approx::assert_relative_eq;
use image::DynamicImage;
use rgbd_rerender::io::{self, OutputKind, depth_io, output_path};
use rgbd_rerender::render::{Backend, create_surface};
use rgbd_rerender::synthetic::disc_scene;
use rgbd_rerender::{Config, Rerenderer};
use std::fs;

const W: u32 = 48;
const H: u32 = 32;

#[test]
fn test_config_file_drives_a_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let frame = disc_scene(W, H, 5.0, 2.0);
    let rgb_path = dir.path().join("rgb.png");
    let depth_path = dir.path().join("depth.npy");
    let out_dir = dir.path().join("out");
    DynamicImage::ImageRgb8(frame.rgb.clone()).save(&rgb_path).unwrap();
    depth_io::save_depth_npy(&depth_path, frame.depth.as_slice(), W, H).unwrap();

    let config_path = dir.path().join("config.json");
    let json = serde_json::json!({
        "rgb_path": rgb_path,
        "depth_path": depth_path,
        "output_dir": out_dir,
        "fx": 40.0,
        "fy": 40.0,
        "focal_scales": [0.5, 1.0],
        "backend": "software",
        "save_npy": true,
    });
    fs::write(&config_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let config = Config::load(&config_path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.backend, Backend::Software);
    assert!(config.save_exr && config.save_png_depth && config.save_npy);

    io::ensure_output_dir(&config.output_dir).unwrap();
    let rgb = io::load_rgb(config.rgb_path.as_ref().unwrap()).unwrap();
    let depth = io::load_depth(config.depth_path.as_ref().unwrap(), config.depth_scale).unwrap();
    assert_eq!(depth.as_slice(), frame.depth.as_slice());

    let source = config.source_intrinsics(depth.width(), depth.height());
    assert_eq!((source.cx, source.cy), (W as f32 / 2.0, H as f32 / 2.0));

    let surface = create_surface(config.backend, config.gpu_device).unwrap();
    let mut driver = Rerenderer::new(surface, config.render_settings());
    driver
        .prepare(&rgb, &depth, &source, config.thresholds())
        .unwrap();

    let options = config.output_options();
    let mut written = Vec::new();
    let rendered = driver
        .render_each(&config.focal_scales, |frame| {
            written.extend(io::save_outputs(&out_dir, frame.scale, &frame.output, &options));
        })
        .unwrap();
    assert_eq!(rendered, 2);
    assert_eq!(written.len(), 10);

    for scale in [0.5f32, 1.0] {
        for kind in [
            OutputKind::Rgb,
            OutputKind::DepthExr,
            OutputKind::DepthPng,
            OutputKind::DepthNpy,
            OutputKind::Mask,
        ] {
            assert!(output_path(&out_dir, scale, kind).exists(), "{:?} at {}", kind, scale);
        }
    }
    assert!(out_dir.join("scale_0.50_rgb.png").exists());
    assert!(out_dir.join("scale_1.00_mask.png").exists());
}

#[test]
fn test_saved_depth_matches_rendered_depth() {
    let dir = tempfile::tempdir().unwrap();
    let frame = disc_scene(W, H, 5.0, 2.0);
    let source = rgbd_rerender::Intrinsics::centered(40.0, 40.0, W, H);
    let surface = create_surface(Backend::Software, None).unwrap();
    let mut driver = Rerenderer::new(surface, Default::default());
    driver
        .prepare(
            &DynamicImage::ImageRgb8(frame.rgb),
            &frame.depth,
            &source,
            Default::default(),
        )
        .unwrap();
    let rendered = driver.render_scale(1.0).unwrap().output;

    let options = io::OutputOptions {
        save_exr: true,
        save_png_depth: true,
        save_npy: true,
    };
    io::save_outputs(dir.path(), 1.0, &rendered, &options);

    let npy = depth_io::load_depth_npy(&output_path(dir.path(), 1.0, OutputKind::DepthNpy)).unwrap();
    assert_eq!(npy.as_slice(), rendered.depth.as_slice());

    let exr = io::load_depth(&output_path(dir.path(), 1.0, OutputKind::DepthExr), 1.0).unwrap();
    for (a, b) in exr.as_slice().iter().zip(&rendered.depth) {
        assert_relative_eq!(*a, *b);
    }

    let png = io::load_depth(&output_path(dir.path(), 1.0, OutputKind::DepthPng), 0.001).unwrap();
    for (a, b) in png.as_slice().iter().zip(&rendered.depth) {
        assert!((a - b).abs() <= 0.001 + 1e-6, "{} vs {}", a, b);
    }

    let mask = image::open(output_path(dir.path(), 1.0, OutputKind::Mask))
        .unwrap()
        .to_luma8();
    for (m, d) in mask.as_raw().iter().zip(&rendered.depth) {
        assert_eq!(*m == 255, *d > 0.0);
        assert!(*m == 0 || *m == 255);
    }
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.is_run_fatal());
}
