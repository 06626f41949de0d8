/*!
Escape-time fractal engine.

A [`FractalConfiguration`] and a [`Viewport`] describe what to render; a
[`ComputeDispatcher`] picks the GPU or CPU engine and returns an
[`EscapeImage`] of per-pixel escape values for a colouring layer to map.
*/

pub mod backend;
pub mod cancel;
pub mod complex;
pub mod config;
pub mod cpu;
pub mod dispatcher;
pub mod error;
pub mod escape;
pub mod gpu;
pub mod iteration;
pub mod screen;
pub mod settings;
pub mod shader;
pub mod viewport;

pub use backend::{Backend, BackendKind};
pub use cancel::CancelToken;
pub use complex::{Complex64, ComplexExt};
pub use config::{FractalConfiguration, OrbitTrap, OutputMode, RegionSplit, Variant};
pub use cpu::CpuEngine;
pub use dispatcher::ComputeDispatcher;
pub use error::EngineError;
pub use escape::{EscapeImage, NEVER_ESCAPED};
pub use gpu::GpuEngine;
pub use settings::Settings;
pub use viewport::Viewport;
