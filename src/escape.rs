//! Engine output handed to the colouring layer.

use crate::{error::EngineError, screen};

/// Value written for pixels that never left the escape radius.
pub const NEVER_ESCAPED: f64 = -1.0;

/// Row-major escape values plus what a colouring layer needs to normalise
/// them.
///
/// Callers must read `size` back rather than assume the request was honoured.
#[derive(Clone, Debug, PartialEq)]
pub struct EscapeImage {
    pub values: Vec<f64>,
    pub size: screen::Size,
    pub iteration_cap: u32,
}

impl EscapeImage {
    /// Allocates `width * height` values set to `fill`, reporting allocation
    /// failure as [`EngineError::Allocation`] instead of aborting.
    pub fn filled(size: screen::Size, iteration_cap: u32, fill: f64) -> Result<Self, EngineError> {
        let values = allocate(size, fill)?;
        Ok(Self {
            values,
            size,
            iteration_cap,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.values[self.size.index(x, y)]
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Whether an escape value counts as "escaped". Negative and non-finite
/// values are treated as never escaped.
pub fn is_escaped(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

pub(crate) fn allocate<A: Clone>(size: screen::Size, fill: A) -> Result<Vec<A>, EngineError> {
    let error = || EngineError::Allocation {
        width: size.width,
        height: size.height,
    };
    let count = size.pixel_count().ok_or_else(error)?;
    let mut values = Vec::new();
    values.try_reserve_exact(count).map_err(|_| error())?;
    values.resize(count, fill);
    Ok(values)
}
