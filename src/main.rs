// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use rgbd_rerender::synthetic::SceneKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "rgbd-rerender")]
#[command(about = "Re-render an RGB-D frame from the same viewpoint with different focal lengths")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one output set per focal scale
    Render(cli::RenderArgs),

    /// Write a synthetic RGB-D pair for trying out `render`
    Sample {
        /// Directory to write the sample into
        #[arg(short, long, default_value = "sample_data")]
        out_dir: PathBuf,

        #[arg(long, default_value_t = rgbd_rerender::constants::synthetic::WIDTH)]
        width: u32,

        #[arg(long, default_value_t = rgbd_rerender::constants::synthetic::HEIGHT)]
        height: u32,

        /// Scene layout (disc, composed)
        #[arg(long, default_value_t = SceneKind::Composed)]
        scene: SceneKind,
    },

    /// Show the GPU adapter and device that `render` would use
    Info {
        /// GPU adapter index
        #[arg(long)]
        gpu: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=rgbd_rerender=debug, RUST_LOG=warn
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => cli::render(args),
        Commands::Sample {
            out_dir,
            width,
            height,
            scene,
        } => cli::sample(&out_dir, width, height, scene),
        Commands::Info { gpu } => cli::info(gpu),
    }
}
