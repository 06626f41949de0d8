//! Device initialisation and capability detection.

use log::{info, warn};

use crate::error::EngineError;

/// The device and queue every GPU computation runs on.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: wgpu::Limits,
    pub adapter_info: wgpu::AdapterInfo,
}

/// Result of a GPU initialisation attempt.
pub enum GpuAvailability {
    Available(GpuContext),
    Unavailable(String),
}

impl GpuContext {
    /// Attempts to initialise a GPU with 64-bit float shader support.
    pub fn try_init() -> GpuAvailability {
        match Self::init() {
            Ok(context) => GpuAvailability::Available(context),
            Err(error) => {
                warn!("GPU initialisation failed: {}", error);
                GpuAvailability::Unavailable(error.to_string())
            }
        }
    }

    pub fn init() -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(wgpu::Backends::all());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| EngineError::BackendUnavailable("no GPU adapter found".into()))?;

        let adapter_info = adapter.get_info();
        if !adapter.features().contains(wgpu::Features::SHADER_FLOAT64) {
            return Err(EngineError::BackendUnavailable(format!(
                "adapter {} does not support 64-bit float shaders",
                adapter_info.name
            )));
        }

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("fractal-device"),
                features: wgpu::Features::SHADER_FLOAT64,
                limits: limits.clone(),
            },
            None,
        ))
        .map_err(|error| EngineError::BackendUnavailable(error.to_string()))?;

        info!(
            "GPU adapter: {} ({:?}, {:?})",
            adapter_info.name, adapter_info.backend, adapter_info.device_type
        );

        Ok(Self {
            device,
            queue,
            limits,
            adapter_info,
        })
    }

    /// Largest buffer, in bytes, that can be bound as kernel storage.
    pub fn max_storage_bytes(&self) -> u64 {
        u64::from(self.limits.max_storage_buffer_binding_size).min(self.limits.max_buffer_size)
    }
}
