// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! - [`rerender`]: RGB-D frame to one output per target focal setting

pub mod rerender;

pub use rerender::{FrameResult, RenderSettings, Rerenderer};
