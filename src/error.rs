//! Engine error types.

use thiserror::Error;

use crate::config::{OutputMode, Variant};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Kernel for {variant} / {mode} failed to compile: {message}")]
    KernelCompile {
        variant: Variant,
        mode: OutputMode,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cannot allocate a {width}x{height} escape buffer")]
    Allocation { width: u32, height: u32 },

    #[error("A computation is already in flight")]
    Busy,

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),
}

impl EngineError {
    /// Errors the dispatcher may answer by falling back to the next backend.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, EngineError::BackendUnavailable(_))
    }
}
