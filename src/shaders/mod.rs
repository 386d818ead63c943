// SPDX-License-Identifier: GPL-3.0-only

//! GPU programs and the processors that drive them

pub mod gpu_processor;
pub mod rerender;

pub use gpu_processor::{padded_bytes_per_row, read_buffer_async};
pub use rerender::GpuSurface;
