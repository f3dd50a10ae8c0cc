use std::fmt;

use thiserror::Error;

use crate::compile::CompileError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GpuErrorKind {
    Validation,
    OutOfMemory,
    Internal,
}

impl fmt::Display for GpuErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpuErrorKind::Validation => "validation",
            GpuErrorKind::OutOfMemory => "out-of-memory",
            GpuErrorKind::Internal => "internal",
        })
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("GPU {kind} error during {operation}: {message}")]
    Gpu {
        operation: &'static str,
        kind: GpuErrorKind,
        message: String,
    },

    #[error("{label} is {width}x{height}; each side must be between 1 and {max} pixels")]
    InvalidTextureSize {
        label: &'static str,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("frame requested before the surface was created")]
    NotCreated,
}

impl RenderError {
    fn from_wgpu(operation: &'static str, error: wgpu::Error) -> Self {
        #[allow(unreachable_patterns)]
        let kind = match &error {
            wgpu::Error::Validation { .. } => GpuErrorKind::Validation,
            wgpu::Error::OutOfMemory { .. } => GpuErrorKind::OutOfMemory,
            wgpu::Error::Internal { .. } => GpuErrorKind::Internal,
            _ => GpuErrorKind::Internal,
        };
        RenderError::Gpu {
            operation,
            kind,
            message: error.to_string(),
        }
    }
}

/// Runs `work` inside validation, out-of-memory, and internal error scopes and
/// turns the first captured error into a [`RenderError::Gpu`].
pub(crate) fn checked<T>(
    device: &wgpu::Device,
    operation: &'static str,
    work: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Internal);

    let value = work();

    let internal = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());

    match validation.or(out_of_memory).or(internal) {
        Some(error) => {
            tracing::error!(operation, error = %error, "GPU operation failed");
            Err(RenderError::from_wgpu(operation, error))
        }
        None => Ok(value),
    }
}
