/*!
Intermediate representation of the GPU kernel's variable parts.

Each [`Variant`] maps to an [`Expr`] tree for its iteration step, and each
[`OutputMode`] to a [`ResultBlock`]. [`crate::shader::wgsl`] renders both; the
same trees evaluate on the CPU through [`Expr::eval`], which lets tests hold
the kernel text and [`crate::iteration::step`] to one definition.
*/

use crate::{
    complex::{self, Complex64, ComplexExt},
    config::{FractalConfiguration, OutputMode, Variant},
};

/// Integer exponent of a [`Expr::Pow`] node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exponent {
    Order,
    OrderMinusOne,
}

impl Exponent {
    pub fn value(self, order: i32) -> i32 {
        match self {
            Exponent::Order => order,
            Exponent::OrderMinusOne => order.wrapping_sub(1),
        }
    }
}

/// Complex64-valued expression over the loop state.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Previous trajectory point.
    Past,
    /// Seed or (possibly inverted) starting point.
    Base,
    One,
    /// The order as a real complex number.
    Order,
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Exponent),
    ComponentAbs(Box<Expr>),
    Conjugate(Box<Expr>),
}

impl Expr {
    pub fn add(self, other: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Expr) -> Expr {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Expr) -> Expr {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: Expr) -> Expr {
        Expr::Div(Box::new(self), Box::new(other))
    }

    pub fn pow(self, exponent: Exponent) -> Expr {
        Expr::Pow(Box::new(self), exponent)
    }

    pub fn component_abs(self) -> Expr {
        Expr::ComponentAbs(Box::new(self))
    }

    pub fn conjugate(self) -> Expr {
        Expr::Conjugate(Box::new(self))
    }

    pub fn eval(&self, past: Complex64, base: Complex64, order: i32) -> Complex64 {
        match self {
            Expr::Past => past,
            Expr::Base => base,
            Expr::One => complex::ONE,
            Expr::Order => Complex64::from(order as f64),
            Expr::Add(a, b) => a.eval(past, base, order) + b.eval(past, base, order),
            Expr::Sub(a, b) => a.eval(past, base, order) - b.eval(past, base, order),
            Expr::Mul(a, b) => a.eval(past, base, order) * b.eval(past, base, order),
            Expr::Div(a, b) => a.eval(past, base, order) / b.eval(past, base, order),
            Expr::Pow(a, exponent) => a.eval(past, base, order).integer_pow(exponent.value(order)),
            Expr::ComponentAbs(a) => a.eval(past, base, order).component_abs(),
            Expr::Conjugate(a) => a.eval(past, base, order).conj(),
        }
    }
}

/// Iteration step of each variant.
pub fn step_expression(variant: Variant) -> Expr {
    match variant {
        Variant::Mandelbrot => Expr::Past.pow(Exponent::Order).add(Expr::Base),
        Variant::BurningShip => Expr::Past
            .component_abs()
            .pow(Exponent::Order)
            .add(Expr::Base),
        Variant::Tricorn => Expr::Past.conjugate().pow(Exponent::Order).add(Expr::Base),
        Variant::Nova => {
            let numerator = Expr::One.mul(Expr::Past.pow(Exponent::Order).sub(Expr::One));
            let denominator = Expr::Order.mul(Expr::Past.pow(Exponent::OrderMinusOne));
            Expr::Past
                .sub(numerator.div(denominator))
                .add(Expr::Base)
        }
        Variant::Circle => Expr::Past.pow(Exponent::Order),
    }
}

/// How the loop turns a trajectory into output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultBlock {
    /// `index - 1` at the first point beyond the threshold, else `-1`.
    EscapeIndex,
    /// Escape index plus the fractional overshoot `k`, else `-1`.
    SmoothEscapeIndex,
    /// Closest approach recorded in the distance ring, scaled by the cap.
    TrapDistance,
    /// Atomic hit counting at each in-bounds trajectory pixel.
    HitCount,
}

impl From<OutputMode> for ResultBlock {
    fn from(mode: OutputMode) -> Self {
        match mode {
            OutputMode::Plain => ResultBlock::EscapeIndex,
            OutputMode::Smooth => ResultBlock::SmoothEscapeIndex,
            OutputMode::OrbitTrap => ResultBlock::TrapDistance,
            OutputMode::Buddha => ResultBlock::HitCount,
        }
    }
}

/// The configuration fields that change the generated kernel text. Everything
/// else, viewport included, is a runtime kernel argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub variant: Variant,
    pub inverse_base: bool,
    pub mode: OutputMode,
}

impl From<&FractalConfiguration> for KernelKey {
    fn from(config: &FractalConfiguration) -> Self {
        Self {
            variant: config.variant(),
            inverse_base: config.inverse_base(),
            mode: config.output_mode(),
        }
    }
}

/// Everything the formatter needs to render one kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelPlan {
    pub key: KernelKey,
    pub step: Expr,
    pub result: ResultBlock,
}

impl From<KernelKey> for KernelPlan {
    fn from(key: KernelKey) -> Self {
        Self {
            key,
            step: step_expression(key.variant),
            result: key.mode.into(),
        }
    }
}
