// SPDX-License-Identifier: GPL-3.0-only

//! GPU context lifecycle
//!
//! A [`GpuContext`] is created explicitly with [`GpuContext::initialize`],
//! owned by the surface that renders with it and released with
//! [`GpuContext::destroy`]. Resources uploaded through one context are never
//! valid on another.

use crate::errors::{AppError, AppResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use ::wgpu;

/// Which limit set the device was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitsTier {
    /// Full limits reported by the adapter
    Adapter,
    /// `wgpu::Limits::downlevel_defaults`
    Downlevel,
    /// `wgpu::Limits::downlevel_webgl2_defaults`
    WebGl2,
}

impl fmt::Display for LimitsTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitsTier::Adapter => write!(f, "adapter"),
            LimitsTier::Downlevel => write!(f, "downlevel"),
            LimitsTier::WebGl2 => write!(f, "webgl2"),
        }
    }
}

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub limits_tier: LimitsTier,
}

/// Explicit GPU context: adapter, device and queue
pub struct GpuContext {
    _instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
}

impl GpuContext {
    /// Create a context, blocking until the device is ready
    ///
    /// `device_index` selects an adapter from the enumeration order; when it is
    /// `None` or out of range the high-performance adapter is used, then the
    /// fallback (software) adapter.
    pub fn initialize(device_index: Option<usize>) -> AppResult<Self> {
        pollster::block_on(Self::initialize_async(device_index))
    }

    async fn initialize_async(device_index: Option<usize>) -> AppResult<Self> {
        info!(?device_index, "Initializing GPU context");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = select_adapter(&instance, device_index).await?;
        let adapter_info = adapter.get_info();

        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "GPU adapter selected"
        );

        let (device, queue, limits_tier) = request_device(&adapter).await?;

        let info = GpuDeviceInfo {
            adapter_name: adapter_info.name.clone(),
            backend: adapter_info.backend,
            device_type: adapter_info.device_type,
            limits_tier,
        };

        Ok(Self {
            _instance: instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            info,
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    /// Largest texture edge the device accepts
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn describe(&self) -> String {
        format!(
            "{} ({:?}, {:?}, {} limits)",
            self.info.adapter_name, self.info.backend, self.info.device_type, self.info.limits_tier
        )
    }

    /// Release the device; every resource created from it becomes invalid
    pub fn destroy(self) {
        debug!(adapter = %self.info.adapter_name, "Destroying GPU context");
        self.device.destroy();
        drop(self.adapter);
    }
}

/// Adapter negotiation: requested index, then high performance, then fallback
async fn select_adapter(
    instance: &wgpu::Instance,
    device_index: Option<usize>,
) -> AppResult<wgpu::Adapter> {
    if let Some(index) = device_index {
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        for (i, adapter) in adapters.iter().enumerate() {
            let info = adapter.get_info();
            debug!(index = i, name = %info.name, backend = ?info.backend, "Adapter");
        }
        match adapters.into_iter().nth(index) {
            Some(adapter) => return Ok(adapter),
            None => warn!(index, "Requested GPU index not found, using default adapter"),
        }
    }

    let high_performance = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await;

    match high_performance {
        Ok(adapter) => Ok(adapter),
        Err(e) => {
            warn!(error = %e, "No hardware adapter, trying fallback adapter");
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::None,
                    compatible_surface: None,
                    force_fallback_adapter: true,
                })
                .await
                .map_err(|e| AppError::Initialization(format!("no GPU adapter available: {}", e)))
        }
    }
}

/// Device negotiation: adapter limits, then downlevel, then WebGL2 defaults
async fn request_device(
    adapter: &wgpu::Adapter,
) -> AppResult<(wgpu::Device, wgpu::Queue, LimitsTier)> {
    let adapter_limits = adapter.limits();
    let tiers = [
        (LimitsTier::Adapter, adapter_limits.clone()),
        (
            LimitsTier::Downlevel,
            wgpu::Limits::downlevel_defaults().using_resolution(adapter_limits.clone()),
        ),
        (
            LimitsTier::WebGl2,
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter_limits),
        ),
    ];

    let mut last_error = String::new();
    for (tier, limits) in tiers {
        let result = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("rerender_device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await;

        match result {
            Ok((device, queue)) => {
                debug!(%tier, "GPU device created");
                return Ok((device, queue, tier));
            }
            Err(e) => {
                warn!(%tier, error = %e, "Device request failed");
                last_error = e.to_string();
            }
        }
    }

    Err(AppError::Initialization(format!(
        "failed to create GPU device: {}",
        last_error
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_tier_display() {
        assert_eq!(LimitsTier::Adapter.to_string(), "adapter");
        assert_eq!(LimitsTier::Downlevel.to_string(), "downlevel");
        assert_eq!(LimitsTier::WebGl2.to_string(), "webgl2");
    }

    #[test]
    fn test_initialize_and_destroy() {
        // This test requires a GPU, so it may be skipped in CI
        match GpuContext::initialize(None) {
            Ok(context) => {
                println!("Created context: {}", context.describe());
                assert!(context.max_texture_dimension() >= 2048);
                context.destroy();
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                assert!(e.is_run_fatal());
            }
        }
    }
}
