// SPDX-License-Identifier: GPL-3.0-only

//! Shared GPU readback helpers
//!
//! Texture-to-buffer copies need rows padded to
//! `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`; these helpers compute that padding,
//! map staging buffers and strip the padding again on the CPU side.

use crate::errors::{AppError, AppResult};
use crate::gpu::wgpu;

/// Row pitch for a texture-to-buffer copy of `unpadded` bytes per row
#[inline]
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Drop per-row padding from a staging buffer copy
pub fn unpad_rows(data: &[u8], unpadded: u32, padded: u32, height: u32) -> Vec<u8> {
    let unpadded = unpadded as usize;
    let padded = padded as usize;
    if unpadded == padded {
        return data[..unpadded * height as usize].to_vec();
    }
    let mut out = Vec::with_capacity(unpadded * height as usize);
    for row in data.chunks(padded).take(height as usize) {
        out.extend_from_slice(&row[..unpadded]);
    }
    out
}

/// Reinterpret little-endian bytes as `f32` samples
pub fn bytes_to_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Helper for async buffer readback (map, poll, read, unmap)
///
/// # Arguments
/// * `device` - The wgpu device for polling
/// * `buffer` - The buffer to read from (must be MAP_READ)
pub async fn read_buffer_async(device: &wgpu::Device, buffer: &wgpu::Buffer) -> AppResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| AppError::render(format!("device poll failed: {}", e)))?;

    receiver
        .await
        .map_err(|_| AppError::render("failed to receive buffer mapping"))?
        .map_err(|e| AppError::render(format!("failed to map buffer: {}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        assert_eq!(padded_bytes_per_row(640 * 4), 2560);
        assert_eq!(padded_bytes_per_row(10), 256);
    }

    #[test]
    fn test_unpad_rows() {
        let mut data = vec![0u8; 2 * 256];
        data[..3].copy_from_slice(&[1, 2, 3]);
        data[256..259].copy_from_slice(&[4, 5, 6]);
        assert_eq!(unpad_rows(&data, 3, 256, 2), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(unpad_rows(&[9, 8, 7, 6], 2, 2, 2), vec![9, 8, 7, 6]);
    }

    #[test]
    fn test_bytes_to_f32() {
        let bytes: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(bytes_to_f32(&bytes), vec![1.5, -2.0]);
    }
}
