use std::sync::Arc;

use futures::channel::oneshot;

use crate::error::{EngineError, EngineResult};
use crate::gpu::error::buffer_mapping_error;

/// Owned device and queue handed to every GPU particle system.
///
/// There is no global device; whoever creates the context decides its
/// lifetime and passes it by reference.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Wrap an existing device, e.g. the renderer's
    pub fn from_parts(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter_info: wgpu::AdapterInfo,
    ) -> Self {
        Self {
            device,
            queue,
            adapter_info,
        }
    }

    /// Create a context without a surface, for tools and tests
    pub async fn headless() -> EngineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EngineError::AdapterNotFound)?;

        let adapter_info = adapter.get_info();
        log::info!(
            "[GpuContext] Using adapter {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Particle Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| EngineError::DeviceRequest(e.to_string()))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
        })
    }

    /// Blocking variant of [`GpuContext::headless`]
    pub fn headless_blocking() -> EngineResult<Self> {
        pollster::block_on(Self::headless())
    }

    /// Copy `size` bytes of `source` into a staging buffer and read them
    /// back. Stalls until the GPU is idle, so only diagnostics use it.
    pub fn read_buffer(
        &self,
        source: &wgpu::Buffer,
        offset: wgpu::BufferAddress,
        size: wgpu::BufferAddress,
        label: &str,
    ) -> EngineResult<Vec<u8>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, offset, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // Receiver only disappears if the caller gave up waiting
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        pollster::block_on(rx)
            .map_err(|_| buffer_mapping_error(label))?
            .map_err(|_| buffer_mapping_error(label))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();
        Ok(bytes)
    }
}
