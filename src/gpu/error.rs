//! GPU subsystem error handling
//!
//! Helpers that turn wgpu failures into crate errors with enough context to
//! tell which resource could not be created.

use crate::error::{EngineError, EngineResult};

/// Helper trait for GPU error contexts
pub trait GpuErrorContext<T> {
    fn gpu_context(self, context: &str) -> EngineResult<T>;
}

impl<T, E> GpuErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn gpu_context(self, context: &str) -> EngineResult<T> {
        self.map_err(|e| gpu_operation_error(context, e))
    }
}

impl<T> GpuErrorContext<T> for Option<T> {
    fn gpu_context(self, context: &str) -> EngineResult<T> {
        self.ok_or_else(|| EngineError::SystemError {
            component: "gpu".to_string(),
            error: format!("{}: missing value", context),
        })
    }
}

/// Create a GPU operation error
pub fn gpu_operation_error(operation: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::GpuOperationFailed {
        operation: operation.to_string(),
        error: error.to_string(),
    }
}

/// Create a buffer mapping error
pub fn buffer_mapping_error(buffer: &str) -> EngineError {
    EngineError::BufferMapping {
        buffer: buffer.to_string(),
    }
}

/// Run `create` inside a validation error scope and fail if wgpu reported
/// anything. Resource creation in wgpu never returns errors directly.
pub fn validated<T>(
    device: &wgpu::Device,
    operation: &str,
    create: impl FnOnce() -> T,
) -> EngineResult<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());

    if let Some(error) = validation.or(out_of_memory) {
        log::error!("[gpu] {} failed: {}", operation, error);
        return Err(gpu_operation_error(operation, error));
    }
    Ok(value)
}
