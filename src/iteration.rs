//! The per-pixel iteration loop, natively on the CPU.
//!
//! [`crate::shader`] renders the same loop as WGSL; the two must agree for
//! every variant and output mode.

use crate::{
    complex::{self, Complex64, ComplexExt},
    config::{FractalConfiguration, OrbitTrap, OutputMode, RegionSplit, Variant},
    escape::NEVER_ESCAPED,
    screen,
    viewport::Viewport,
};

/// Ring length upper bound for orbit-trap distances.
pub const MAX_TRAP_SLOTS: usize = 5;

/// One iteration step of `variant`.
pub fn step(variant: Variant, past: Complex64, base: Complex64, order: i32) -> Complex64 {
    match variant {
        Variant::Mandelbrot => past.integer_pow(order) + base,
        Variant::BurningShip => past.component_abs().integer_pow(order) + base,
        Variant::Tricorn => past.conj().integer_pow(order) + base,
        Variant::Nova => {
            past - (complex::ONE * (past.integer_pow(order) - complex::ONE))
                / (Complex64::from(order as f64) * past.integer_pow(order.wrapping_sub(1)))
                + base
        }
        Variant::Circle => past.integer_pow(order),
    }
}

/// A configuration, viewport and image size bound together, ready to run the
/// iteration loop for any pixel.
#[derive(Clone, Copy, Debug)]
pub struct PixelKernel {
    variant: Variant,
    mode: OutputMode,
    iteration_cap: u32,
    threshold_squared: f64,
    order: i32,
    seed: Option<Complex64>,
    inverse_base: bool,
    orbit_trap: OrbitTrap,
    region_split: RegionSplit,
    viewport: Viewport,
    size: screen::Size,
}

impl PixelKernel {
    pub fn new(config: &FractalConfiguration, viewport: &Viewport, size: screen::Size) -> Self {
        Self {
            variant: config.variant(),
            mode: config.output_mode(),
            iteration_cap: config.iteration_cap(),
            threshold_squared: config.escape_threshold_squared(),
            order: config.order(),
            seed: config.seed(),
            inverse_base: config.inverse_base(),
            orbit_trap: config.orbit_trap(),
            region_split: config.region_split(),
            viewport: *viewport,
            size,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn size(&self) -> screen::Size {
        self.size
    }

    /// Starting point and base of the trajectory for pixel `(x, y)`.
    pub fn start(&self, x: u32, y: u32) -> (Complex64, Complex64) {
        let past = self.viewport.pixel_to_point(x, y, self.size);
        let base = self.seed.unwrap_or(past);
        if self.inverse_base {
            (past.inverse(), base.inverse())
        } else {
            (past, base)
        }
    }

    fn step(&self, past: Complex64, base: Complex64) -> Complex64 {
        step(self.variant, past, base, self.order)
    }

    /// Escape value of pixel `(x, y)` in plain, smooth or orbit-trap mode.
    ///
    /// Buddha mode writes to other pixels and goes through [`Self::trace`]
    /// instead; asking for it here yields `0`, the value of an unvisited
    /// Buddha pixel.
    pub fn escape_value(&self, x: u32, y: u32) -> f64 {
        match self.mode {
            OutputMode::Plain => self.plain(x, y),
            OutputMode::Smooth => self.smooth(x, y),
            OutputMode::OrbitTrap => self.orbit_trap(x, y),
            OutputMode::Buddha => 0.0,
        }
    }

    fn plain(&self, x: u32, y: u32) -> f64 {
        let (mut past, base) = self.start(x, y);
        for i in 1..self.iteration_cap {
            let current = self.step(past, base);
            if current.norm_sqr() > self.threshold_squared {
                return (i - 1) as f64;
            }
            past = current;
        }
        NEVER_ESCAPED
    }

    fn smooth(&self, x: u32, y: u32) -> f64 {
        let (mut past, base) = self.start(x, y);
        for i in 1..self.iteration_cap {
            let current = self.step(past, base);
            let modulus = current.norm_sqr();
            if modulus > self.threshold_squared {
                let previous = past.norm_sqr();
                let mut k = (self.threshold_squared - previous) / (previous - modulus).abs();
                // Also catches NaN from a zero denominator.
                if !(k > 0.0) {
                    k = 0.0;
                }
                return i as f64 + k - 1.0;
            }
            past = current;
        }
        NEVER_ESCAPED
    }

    fn orbit_trap(&self, x: u32, y: u32) -> f64 {
        let (mut past, base) = self.start(x, y);
        let slots = self.region_split.slot_count();
        let mut distance = [f64::INFINITY; MAX_TRAP_SLOTS];

        for i in 1..self.iteration_cap {
            let current = self.step(past, base);
            let slot = i as usize % slots;

            match self.orbit_trap {
                OrbitTrap::Cross => {
                    let real = current.re * current.re;
                    let imaginary = current.im * current.im;
                    if real < distance[slot] {
                        distance[slot] = real;
                    }
                    if imaginary < distance[slot] {
                        distance[slot] = imaginary;
                    }
                }
                OrbitTrap::Dots | OrbitTrap::None => {
                    let modulus = current.norm_sqr();
                    if modulus < distance[slot] {
                        distance[slot] = modulus;
                    }
                }
            }

            if i == self.iteration_cap - 1 {
                let pointer = match self.region_split {
                    RegionSplit::Quadrant => {
                        usize::from(current.im > 0.0) + 2 * usize::from(current.re > 0.0)
                    }
                    _ => slot,
                };
                return if distance[pointer] < 1.0 {
                    distance[pointer].sqrt() * self.iteration_cap as f64
                } else {
                    0.0
                };
            }
            past = current;
        }
        0.0
    }

    /// Buddha mode: follows the trajectory of pixel `(x, y)` and increments
    /// `hits` at every in-bounds pixel it visits. Returns the number of hits.
    ///
    /// Counters are 64-bit: a seeded run can pile more than `u32::MAX` hits
    /// onto a single attractor pixel.
    pub fn trace(&self, x: u32, y: u32, hits: &mut [u64]) -> u64 {
        let (mut past, base) = self.start(x, y);
        let mut count = 0;
        for _ in 1..self.iteration_cap {
            let current = self.step(past, base);
            if let Some((column, row)) = self.viewport.point_to_pixel(current, self.size) {
                hits[self.size.index(column, row)] += 1;
                count += 1;
            }
            past = current;
        }
        count
    }
}
