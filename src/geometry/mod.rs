// SPDX-License-Identifier: GPL-3.0-only

//! Pinhole camera model and the pixel/camera/clip space transforms
//!
//! Camera space is X right, Y down, Z forward (meters). Pixel coordinates put
//! the origin at the top-left corner of the top-left pixel, so the center of
//! pixel `(u, v)` sits at `(u + 0.5, v + 0.5)`.

mod intrinsics;
mod projection;

pub use intrinsics::Intrinsics;
pub use projection::{ndc_to_pixel, projection_matrix};
