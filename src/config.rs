//! Per-pixel formula parameters.
//!
//! [`FractalConfiguration`] is a value: every `with_*` setter returns a new
//! snapshot and leaves the original untouched. The viewport lives separately
//! in [`crate::viewport::Viewport`] so panning never invalidates a compiled
//! GPU kernel.

use std::{fmt, str::FromStr};

use crate::{complex::Complex64, error::EngineError};

/// The five supported fractal formulas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Mandelbrot,
    BurningShip,
    Tricorn,
    Nova,
    Circle,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Mandelbrot,
        Variant::BurningShip,
        Variant::Tricorn,
        Variant::Nova,
        Variant::Circle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Mandelbrot => "Mandelbrot",
            Variant::BurningShip => "Burning Ship",
            Variant::Tricorn => "Tricorn",
            Variant::Nova => "Nova",
            Variant::Circle => "Circle",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|variant| variant.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::InvalidConfiguration(format!("unknown variant {s:?}")))
    }
}

/// What an orbit trap measures the trajectory against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum OrbitTrap {
    #[default]
    None,
    /// Closest approach to either axis.
    Cross,
    /// Closest approach to the origin.
    Dots,
}

impl OrbitTrap {
    pub const ALL: [OrbitTrap; 3] = [OrbitTrap::None, OrbitTrap::Cross, OrbitTrap::Dots];

    /// Selector index passed to the GPU kernel.
    pub fn index(self) -> u32 {
        match self {
            OrbitTrap::None => 0,
            OrbitTrap::Cross => 1,
            OrbitTrap::Dots => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OrbitTrap::None => "None",
            OrbitTrap::Cross => "Cross",
            OrbitTrap::Dots => "Dots",
        }
    }
}

impl fmt::Display for OrbitTrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrbitTrap {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrbitTrap::ALL
            .into_iter()
            .find(|trap| trap.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::InvalidConfiguration(format!("unknown orbit trap {s:?}")))
    }
}

/// How orbit-trap distances are bucketed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RegionSplit {
    #[default]
    None,
    /// Final slot picked by the quadrant of the last trajectory point.
    Quadrant,
    Axis,
}

impl RegionSplit {
    pub const ALL: [RegionSplit; 3] = [RegionSplit::None, RegionSplit::Quadrant, RegionSplit::Axis];

    /// Selector index passed to the GPU kernel.
    pub fn index(self) -> u32 {
        match self {
            RegionSplit::None => 0,
            RegionSplit::Quadrant => 1,
            RegionSplit::Axis => 2,
        }
    }

    /// Length of the orbit-trap distance ring.
    pub fn slot_count(self) -> usize {
        match self {
            RegionSplit::None => 1,
            RegionSplit::Quadrant => 5,
            RegionSplit::Axis => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegionSplit::None => "None",
            RegionSplit::Quadrant => "Quadrant",
            RegionSplit::Axis => "Axis",
        }
    }
}

impl fmt::Display for RegionSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegionSplit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionSplit::ALL
            .into_iter()
            .find(|split| split.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::InvalidConfiguration(format!("unknown region split {s:?}")))
    }
}

/// Result-extraction strategy layered over the shared iteration loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputMode {
    Plain,
    Smooth,
    OrbitTrap,
    Buddha,
}

impl OutputMode {
    pub const ALL: [OutputMode; 4] = [
        OutputMode::Plain,
        OutputMode::Smooth,
        OutputMode::OrbitTrap,
        OutputMode::Buddha,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputMode::Plain => "plain",
            OutputMode::Smooth => "smooth",
            OutputMode::OrbitTrap => "orbit trap",
            OutputMode::Buddha => "buddha",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalConfiguration {
    variant: Variant,
    iteration_cap: u32,
    escape_threshold: f64,
    order: i32,
    seed: Option<Complex64>,
    inverse_base: bool,
    buddha: bool,
    orbit_trap: OrbitTrap,
    region_split: RegionSplit,
    smoothing: bool,
}

impl Default for FractalConfiguration {
    fn default() -> Self {
        Self {
            variant: Variant::Mandelbrot,
            iteration_cap: 100,
            escape_threshold: 2.0,
            order: 2,
            seed: None,
            inverse_base: false,
            buddha: false,
            orbit_trap: OrbitTrap::None,
            region_split: RegionSplit::None,
            smoothing: true,
        }
    }
}

impl FractalConfiguration {
    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn iteration_cap(&self) -> u32 {
        self.iteration_cap
    }

    pub fn escape_threshold(&self) -> f64 {
        self.escape_threshold
    }

    pub fn escape_threshold_squared(&self) -> f64 {
        self.escape_threshold * self.escape_threshold
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Julia-mode base. `None` means every pixel uses its own starting point.
    pub fn seed(&self) -> Option<Complex64> {
        self.seed
    }

    pub fn inverse_base(&self) -> bool {
        self.inverse_base
    }

    pub fn buddha(&self) -> bool {
        self.buddha
    }

    pub fn orbit_trap(&self) -> OrbitTrap {
        self.orbit_trap
    }

    pub fn region_split(&self) -> RegionSplit {
        self.region_split
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    /// Buddha wins over orbit traps, which win over smoothing.
    pub fn output_mode(&self) -> OutputMode {
        if self.buddha {
            OutputMode::Buddha
        } else if self.orbit_trap != OrbitTrap::None {
            OutputMode::OrbitTrap
        } else if self.smoothing {
            OutputMode::Smooth
        } else {
            OutputMode::Plain
        }
    }

    pub fn with_variant(self, variant: Variant) -> Self {
        Self { variant, ..self }
    }

    pub fn with_iteration_cap(self, iteration_cap: u32) -> Self {
        Self {
            iteration_cap,
            ..self
        }
    }

    pub fn with_escape_threshold(self, escape_threshold: f64) -> Self {
        Self {
            escape_threshold,
            ..self
        }
    }

    pub fn with_order(self, order: i32) -> Self {
        Self { order, ..self }
    }

    pub fn with_seed(self, seed: Option<Complex64>) -> Self {
        Self { seed, ..self }
    }

    pub fn with_inverse_base(self, inverse_base: bool) -> Self {
        Self {
            inverse_base,
            ..self
        }
    }

    pub fn with_buddha(self, buddha: bool) -> Self {
        Self { buddha, ..self }
    }

    pub fn with_orbit_trap(self, orbit_trap: OrbitTrap) -> Self {
        Self { orbit_trap, ..self }
    }

    pub fn with_region_split(self, region_split: RegionSplit) -> Self {
        Self {
            region_split,
            ..self
        }
    }

    pub fn with_smoothing(self, smoothing: bool) -> Self {
        Self { smoothing, ..self }
    }

    /// Sets the mode flags so that [`Self::output_mode`] returns `mode`.
    /// Selecting [`OutputMode::OrbitTrap`] keeps the current trap, or picks
    /// [`OrbitTrap::Cross`] when none is set.
    pub fn with_output_mode(self, mode: OutputMode) -> Self {
        let orbit_trap = match (mode, self.orbit_trap) {
            (OutputMode::OrbitTrap, OrbitTrap::None) => OrbitTrap::Cross,
            (OutputMode::OrbitTrap, trap) => trap,
            _ => OrbitTrap::None,
        };
        Self {
            buddha: mode == OutputMode::Buddha,
            orbit_trap,
            smoothing: mode == OutputMode::Smooth,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.iteration_cap == 0 {
            return Err(EngineError::InvalidConfiguration(
                "iteration cap must be at least 1".into(),
            ));
        }
        if !self.escape_threshold.is_finite() || self.escape_threshold <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "escape threshold must be finite and positive, got {}",
                self.escape_threshold
            )));
        }
        if let Some(seed) = self.seed {
            if !seed.is_finite() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "seed must be finite, got {seed}"
                )));
            }
        }
        Ok(())
    }
}
