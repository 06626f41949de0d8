use std::fmt;

use crate::{
    cancel::CancelToken,
    config::{FractalConfiguration, Variant},
    error::EngineError,
    escape::EscapeImage,
    screen,
    viewport::Viewport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Gpu,
    Cpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Gpu => "GPU",
            BackendKind::Cpu => "CPU",
        })
    }
}

/// A compute engine the dispatcher can drive.
///
/// `compute` takes `&mut self` because engines keep setup state between calls
/// (compiled kernels, worker pools); the dispatcher serializes calls.
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Variants this backend can render, in selector order.
    fn implemented_variants(&self) -> Vec<Variant> {
        Variant::ALL.to_vec()
    }

    fn compute(
        &mut self,
        config: &FractalConfiguration,
        viewport: &Viewport,
        size: screen::Size,
        cancel: &CancelToken,
    ) -> Result<EscapeImage, EngineError>;
}

/// Checks shared by every backend before any work starts.
pub fn validate_request(
    config: &FractalConfiguration,
    viewport: &Viewport,
    size: screen::Size,
) -> Result<(), EngineError> {
    config.validate()?;
    viewport.validate()?;
    if size.width == 0 || size.height == 0 {
        return Err(EngineError::InvalidConfiguration(format!(
            "image size must be non-zero, got {}x{}",
            size.width, size.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_images_are_rejected() {
        let config = FractalConfiguration::default();
        let viewport = Viewport::default();
        assert!(validate_request(&config, &viewport, screen::Size::new(4, 4)).is_ok());
        assert!(matches!(
            validate_request(&config, &viewport, screen::Size::new(0, 4)),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(validate_request(
            &config.with_iteration_cap(0),
            &viewport,
            screen::Size::new(4, 4)
        )
        .is_err());
    }
}
