/*!
WGSL rendering of a [`KernelPlan`].

The kernel is one fixed skeleton with two slots: the iteration step and the
result block. Complex arithmetic lives in helper functions that repeat
[`num_complex::Complex64`] and [`crate::complex::ComplexExt`] operation for
operation, in the same order, so the GPU and CPU round identically.

naga's WGSL front end has no `f64` literals; every double constant is written
as a conversion such as `f64(1.0)`, which is exact for the values used here.
*/

use bytemuck::{Pod, Zeroable};

use crate::{
    config::FractalConfiguration,
    gpu::compute::{FRACTAL_DISPATCH_SIZE_Y, FRACTAL_WORKGROUP_SIZE_Y},
    screen,
    shader::ir::{Exponent, Expr, KernelPlan, ResultBlock},
    viewport::Viewport,
};

/// Name of the compute entry point.
pub const ENTRY_POINT: &str = "fractal";

/// Seed value meaning "no seed, use the pixel's own starting point".
///
/// `f32::MAX` widened, so the kernel can spell it exactly without an `f64`
/// literal.
pub const NO_SEED: f64 = f32::MAX as f64;

/**
Runtime arguments of every kernel, bound read-only at `@binding(0)`.

Field order and types must match the `Params` struct in the generated source.
*/
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct KernelParams {
    pub start: f64,
    pub end: f64,
    pub top: f64,
    pub bottom: f64,
    pub threshold: f64,
    pub seed_real: f64,
    pub seed_imaginary: f64,
    /// Initial orbit-trap distance.
    pub unbounded: f64,
    pub width: u32,
    pub height: u32,
    pub iteration_cap: u32,
    pub order: i32,
    pub orbit_trap: u32,
    pub region_split: u32,
}

impl KernelParams {
    pub fn new(config: &FractalConfiguration, viewport: &Viewport, size: screen::Size) -> Self {
        let seed = config.seed();
        Self {
            start: viewport.start,
            end: viewport.end,
            top: viewport.top,
            bottom: viewport.bottom,
            threshold: config.escape_threshold(),
            seed_real: seed.map_or(NO_SEED, |seed| seed.re),
            seed_imaginary: seed.map_or(NO_SEED, |seed| seed.im),
            unbounded: f64::INFINITY,
            width: size.width,
            height: size.height,
            iteration_cap: config.iteration_cap(),
            order: config.order(),
            orbit_trap: config.orbit_trap().index(),
            region_split: config.region_split().index(),
        }
    }
}

const PRELUDE: &str = "
struct Complex {
    re: f64,
    im: f64,
}

struct Params {
    start: f64,
    end: f64,
    top: f64,
    bottom: f64,
    threshold: f64,
    seed_re: f64,
    seed_im: f64,
    unbounded: f64,
    width: u32,
    height: u32,
    iterations: u32,
    order: i32,
    orbit: u32,
    region: u32,
}

@group(0) @binding(0)
var<storage, read> params: Params;

fn c_new(re: f64, im: f64) -> Complex {
    return Complex(re, im);
}

fn c_one() -> Complex {
    return Complex(f64(1.0), f64(0.0));
}

fn c_add(a: Complex, b: Complex) -> Complex {
    return Complex(a.re + b.re, a.im + b.im);
}

fn c_sub(a: Complex, b: Complex) -> Complex {
    return Complex(a.re - b.re, a.im - b.im);
}

fn c_mul(a: Complex, b: Complex) -> Complex {
    return Complex(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re);
}

fn c_div(a: Complex, b: Complex) -> Complex {
    let d = b.re * b.re + b.im * b.im;
    return Complex((a.re * b.re + a.im * b.im) / d, (a.im * b.re - a.re * b.im) / d);
}

fn c_inv(a: Complex) -> Complex {
    return c_div(c_one(), a);
}

fn c_abs(a: Complex) -> Complex {
    return Complex(abs(a.re), abs(a.im));
}

fn c_conj(a: Complex) -> Complex {
    return Complex(a.re, -a.im);
}

fn c_mod2(a: Complex) -> f64 {
    return a.re * a.re + a.im * a.im;
}

fn c_pow2(c: Complex) -> Complex {
    let r = c.re;
    let i = c.im;
    return Complex(r * r - i * i, f64(2.0) * r * i);
}

fn c_pow3(c: Complex) -> Complex {
    let r = c.re;
    let i = c.im;
    return Complex(
        r * r * r - f64(3.0) * i * i * r,
        f64(3.0) * i * r * r - i * i * i
    );
}

fn c_pow5(c: Complex) -> Complex {
    let r = c.re;
    let i = c.im;
    return Complex(
        r * r * r * r * r - f64(10.0) * i * i * r * r * r + f64(5.0) * i * i * i * i * r,
        f64(5.0) * i * r * r * r * r - f64(10.0) * i * i * i * r * r + i * i * i * i * i
    );
}

fn c_pow7(c: Complex) -> Complex {
    let r = c.re;
    let i = c.im;
    return Complex(
        r * r * r * r * r * r * r - f64(21.0) * i * i * r * r * r * r * r
            + f64(35.0) * i * i * i * i * r * r * r
            - f64(7.0) * i * i * i * i * i * i * r,
        f64(7.0) * i * r * r * r * r * r * r - f64(35.0) * i * i * i * r * r * r * r
            + f64(21.0) * i * i * i * i * i * r * r
            - i * i * i * i * i * i * i
    );
}

fn c_pow_unsigned(c: Complex, exponent: u32) -> Complex {
    var result = c_one();
    var square = c;
    var e = exponent;
    loop {
        if (e == 0u) {
            break;
        }
        if ((e & 1u) == 1u) {
            result = c_mul(result, square);
        }
        square = c_mul(square, square);
        e = e >> 1u;
    }
    return result;
}

fn c_pow(c: Complex, n: i32) -> Complex {
    if (n == 0) {
        return c_one();
    }
    if (n == 1) {
        return c;
    }
    if (n == 2) {
        return c_pow2(c);
    }
    if (n == 3) {
        return c_pow3(c);
    }
    if (n == 4) {
        return c_pow2(c_pow2(c));
    }
    if (n == 5) {
        return c_pow5(c);
    }
    if (n == 6) {
        return c_pow3(c_pow2(c));
    }
    if (n == 7) {
        return c_pow7(c);
    }
    if (n == 8) {
        return c_pow2(c_pow2(c_pow2(c)));
    }
    if (n == 9) {
        return c_pow3(c_pow3(c));
    }
    if (n == 10) {
        return c_pow5(c_pow2(c));
    }
    if (n < 0) {
        return c_pow_unsigned(c_inv(c), u32(-n));
    }
    return c_pow_unsigned(c, u32(n));
}
";

/// Renders one step expression as a WGSL expression.
pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Past => "past".to_string(),
        Expr::Base => "base".to_string(),
        Expr::One => "c_one()".to_string(),
        Expr::Order => "c_new(f64(params.order), f64(0.0))".to_string(),
        Expr::Add(a, b) => format!("c_add({}, {})", render_expr(a), render_expr(b)),
        Expr::Sub(a, b) => format!("c_sub({}, {})", render_expr(a), render_expr(b)),
        Expr::Mul(a, b) => format!("c_mul({}, {})", render_expr(a), render_expr(b)),
        Expr::Div(a, b) => format!("c_div({}, {})", render_expr(a), render_expr(b)),
        Expr::Pow(a, Exponent::Order) => format!("c_pow({}, params.order)", render_expr(a)),
        Expr::Pow(a, Exponent::OrderMinusOne) => {
            format!("c_pow({}, params.order - 1)", render_expr(a))
        }
        Expr::ComponentAbs(a) => format!("c_abs({})", render_expr(a)),
        Expr::Conjugate(a) => format!("c_conj({})", render_expr(a)),
    }
}

fn output_binding(result: ResultBlock) -> &'static str {
    match result {
        ResultBlock::HitCount => {
            "@group(0) @binding(1)\nvar<storage, read_write> hits: array<atomic<u32>>;\n"
        }
        _ => "@group(0) @binding(1)\nvar<storage, read_write> results: array<f64>;\n",
    }
}

/// Statements between the start point and the loop.
fn setup(result: ResultBlock) -> &'static str {
    match result {
        ResultBlock::EscapeIndex | ResultBlock::SmoothEscapeIndex => "
    results[id] = f64(-1.0);
",
        ResultBlock::TrapDistance => "
    results[id] = f64(0.0);
    var slots = 1u;
    if (params.region == 1u) {
        slots = 5u;
    } else if (params.region == 2u) {
        slots = 4u;
    }
    var trapped: array<f64, 5>;
    for (var s = 0u; s < 5u; s = s + 1u) {
        trapped[s] = params.unbounded;
    }
",
        ResultBlock::HitCount => "",
    }
}

/// Loop body after `current` is computed. `t` is the squared threshold.
fn result_block(result: ResultBlock) -> &'static str {
    match result {
        ResultBlock::EscapeIndex => "
        if (c_mod2(current) > t) {
            results[id] = f64(i - 1u);
            return;
        }
",
        ResultBlock::SmoothEscapeIndex => "
        let modulus = c_mod2(current);
        if (modulus > t) {
            let previous = c_mod2(past);
            var k = (t - previous) / abs(previous - modulus);
            if (!(k > f64(0.0))) {
                k = f64(0.0);
            }
            results[id] = f64(i) + k - f64(1.0);
            return;
        }
",
        ResultBlock::TrapDistance => "
        let slot = i % slots;
        if (params.orbit == 1u) {
            let re2 = current.re * current.re;
            let im2 = current.im * current.im;
            if (re2 < trapped[slot]) {
                trapped[slot] = re2;
            }
            if (im2 < trapped[slot]) {
                trapped[slot] = im2;
            }
        } else {
            let modulus = c_mod2(current);
            if (modulus < trapped[slot]) {
                trapped[slot] = modulus;
            }
        }
        if (i == params.iterations - 1u) {
            var pointer = slot;
            if (params.region == 1u) {
                pointer = select(0u, 1u, current.im > f64(0.0)) + 2u * select(0u, 1u, current.re > f64(0.0));
            }
            if (trapped[pointer] < f64(1.0)) {
                results[id] = sqrt(trapped[pointer]) * f64(params.iterations);
            } else {
                results[id] = f64(0.0);
            }
            return;
        }
",
        ResultBlock::HitCount => "
        let column = floor(f64(params.width) * (current.re - params.start) / (params.end - params.start));
        let row = floor(f64(params.height) * (current.im - params.top) / (params.bottom - params.top));
        if (column >= f64(0.0) && column < f64(params.width) && row >= f64(0.0) && row < f64(params.height)) {
            let visited = atomicAdd(&hits[u32(row) * params.width + u32(column)], 1u);
        }
",
    }
}

/// Full kernel source for `plan`.
pub fn render(plan: &KernelPlan) -> String {
    let mut source = String::from(PRELUDE);
    source.push('\n');
    source.push_str(output_binding(plan.result));

    source.push_str(&format!(
        "
@compute @workgroup_size(1, {workgroup_y}, 1)
fn {entry}(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let id = global_id.x * {row_stride}u + global_id.y;
    if (id >= params.width * params.height) {{
        return;
    }}
    let x = id % params.width;
    let y = id / params.width;

    var past = Complex(
        params.start + (params.end - params.start) * f64(x) / f64(params.width),
        params.top + (params.bottom - params.top) * f64(y) / f64(params.height)
    );
    var base = past;
    if (params.seed_re != f64({no_seed:e}) || params.seed_im != f64({no_seed:e})) {{
        base = Complex(params.seed_re, params.seed_im);
    }}
",
        workgroup_y = FRACTAL_WORKGROUP_SIZE_Y,
        entry = ENTRY_POINT,
        row_stride = FRACTAL_DISPATCH_SIZE_Y * FRACTAL_WORKGROUP_SIZE_Y,
        no_seed = f32::MAX,
    ));

    if plan.key.inverse_base {
        source.push_str("    past = c_inv(past);\n    base = c_inv(base);\n");
    }

    source.push_str(setup(plan.result));
    source.push_str(
        "
    let t = params.threshold * params.threshold;
    for (var i = 1u; i < params.iterations; i = i + 1u) {
",
    );
    source.push_str(&format!("        let current = {};\n", render_expr(&plan.step)));
    source.push_str(result_block(plan.result));
    source.push_str("        past = current;\n    }\n}\n");
    source
}
