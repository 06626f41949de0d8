/*!
GPU kernel generation.

A kernel is keyed by [`KernelKey`]: the variant, the inverse-base flag and the
output mode. [`ir`] turns a key into an expression tree and a result block,
[`wgsl`] renders them, and [`validate`] checks the text with naga before it
ever reaches a device.
*/

pub mod ir;
pub mod validate;
pub mod wgsl;

use log::trace;

pub use ir::{KernelKey, KernelPlan};
pub use wgsl::{KernelParams, ENTRY_POINT, NO_SEED};

use crate::error::EngineError;

/// Kernel source for `key`.
pub fn generate(key: KernelKey) -> String {
    let source = wgsl::render(&KernelPlan::from(key));
    trace!("generated kernel for {:?}:\n{}", key, source);
    source
}

/// Kernel source for `key`, rejected with [`EngineError::KernelCompile`] if
/// naga does not accept it.
pub fn generate_checked(key: KernelKey) -> Result<String, EngineError> {
    let source = generate(key);
    validate::validate(&source).map_err(|message| EngineError::KernelCompile {
        variant: key.variant,
        mode: key.mode,
        message,
    })?;
    Ok(source)
}
