//! GPU engine on `wgpu`, running kernels generated by [`crate::shader`].

pub mod cache;
pub mod command_encoder;
pub mod compute;
pub mod context;
pub mod engine;
pub mod typed_buffer;

pub use context::{GpuAvailability, GpuContext};
pub use engine::GpuEngine;
