//! Offline checking of generated WGSL with naga, the translator wgpu itself
//! compiles shaders with. Runs without a GPU.

use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Parses and validates `source` with 64-bit float support enabled.
///
/// The error string carries naga's diagnostic, rendered against the source.
pub fn validate(source: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|error| error.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::FLOAT64)
        .validate(&module)
        .map_err(|error| format!("{:?}", error))?;
    Ok(module)
}
