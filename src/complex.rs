//! 64-bit complex arithmetic shared by every iteration formula.
//!
//! Values are [`num_complex::Complex64`]. Its `Mul` and `Div` evaluate the
//! same expressions, in the same order, as the kernel's `c_mul` and `c_div`.
//! What the fractals need beyond that lives in [`ComplexExt`].

pub use num_complex::Complex64;

pub const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub const ONE: Complex64 = Complex64::new(1.0, 0.0);

pub trait ComplexExt: Sized {
    /// Component-wise absolute value, as used by the Burning Ship.
    fn component_abs(self) -> Self;

    /// `1 / self` through complex division, like the kernel's `c_inv`. A
    /// zero-modulus input yields non-finite components.
    fn inverse(self) -> Self;

    fn checked_div(self, divisor: Self) -> Option<Self>;

    fn checked_inverse(self) -> Option<Self>;

    /**
    Integer power.

    Exponents `0..=10` use closed binomial forms (4, 6, 8, 9 and 10 are
    composed from the smaller ones). Every other exponent goes through
    exponentiation by squaring; negative exponents raise the inverse.
    The GPU kernel's `c_pow` is written to the same recipe.
    */
    fn integer_pow(self, n: i32) -> Self;
}

impl ComplexExt for Complex64 {
    fn component_abs(self) -> Self {
        Complex64::new(self.re.abs(), self.im.abs())
    }

    fn inverse(self) -> Self {
        ONE / self
    }

    fn checked_div(self, divisor: Self) -> Option<Self> {
        if divisor.norm_sqr() == 0.0 {
            None
        } else {
            Some(self / divisor)
        }
    }

    fn checked_inverse(self) -> Option<Self> {
        ONE.checked_div(self)
    }

    fn integer_pow(self, n: i32) -> Self {
        let r = self.re;
        let i = self.im;
        match n {
            0 => ONE,
            1 => self,
            2 => Complex64::new(r * r - i * i, 2.0 * r * i),
            3 => Complex64::new(
                r * r * r - 3.0 * i * i * r,
                3.0 * i * r * r - i * i * i,
            ),
            5 => Complex64::new(
                r * r * r * r * r - 10.0 * i * i * r * r * r + 5.0 * i * i * i * i * r,
                5.0 * i * r * r * r * r - 10.0 * i * i * i * r * r + i * i * i * i * i,
            ),
            7 => Complex64::new(
                r * r * r * r * r * r * r - 21.0 * i * i * r * r * r * r * r
                    + 35.0 * i * i * i * i * r * r * r
                    - 7.0 * i * i * i * i * i * i * r,
                7.0 * i * r * r * r * r * r * r - 35.0 * i * i * i * r * r * r * r
                    + 21.0 * i * i * i * i * i * r * r
                    - i * i * i * i * i * i * i,
            ),
            4 => self.integer_pow(2).integer_pow(2),
            6 => self.integer_pow(2).integer_pow(3),
            8 => self.integer_pow(2).integer_pow(4),
            9 => self.integer_pow(3).integer_pow(3),
            10 => self.integer_pow(2).integer_pow(5),
            n if n < 0 => pow_unsigned(self.inverse(), n.unsigned_abs()),
            n => pow_unsigned(self, n.unsigned_abs()),
        }
    }
}

fn pow_unsigned(base: Complex64, mut exponent: u32) -> Complex64 {
    let mut result = ONE;
    let mut square = base;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * square;
        }
        square = square * square;
        exponent >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex64, b: Complex64, tolerance: f64) -> bool {
        let scale = 1.0_f64.max(b.re.abs()).max(b.im.abs());
        (a.re - b.re).abs() <= tolerance * scale && (a.im - b.im).abs() <= tolerance * scale
    }

    #[test]
    fn division_matches_the_kernel_formula_bit_for_bit() {
        let a = Complex64::new(0.3, 0.7);
        let b = Complex64::new(-1.25, 0.5);
        let d = b.re * b.re + b.im * b.im;
        let expected = Complex64::new(
            (a.re * b.re + a.im * b.im) / d,
            (a.im * b.re - a.re * b.im) / d,
        );
        let actual = a / b;
        assert_eq!(actual.re.to_bits(), expected.re.to_bits());
        assert_eq!(actual.im.to_bits(), expected.im.to_bits());
    }

    #[test]
    fn checked_division_rejects_zero_divisor() {
        assert_eq!(ONE.checked_div(ZERO), None);
        assert_eq!(ZERO.checked_inverse(), None);
        assert!(Complex64::new(2.0, 0.0).checked_inverse().is_some());
    }

    #[test]
    fn unchecked_inverse_of_zero_is_not_finite() {
        assert!(!ZERO.inverse().is_finite());
    }

    #[test]
    fn composed_powers_match_their_recipe_exactly() {
        let z = Complex64::new(0.37, -1.21);
        assert_eq!(z.integer_pow(4), z.integer_pow(2).integer_pow(2));
        assert_eq!(z.integer_pow(6), z.integer_pow(2).integer_pow(3));
        assert_eq!(z.integer_pow(8), z.integer_pow(2).integer_pow(4));
        assert_eq!(z.integer_pow(9), z.integer_pow(3).integer_pow(3));
        assert_eq!(z.integer_pow(10), z.integer_pow(2).integer_pow(5));
    }

    #[test]
    fn large_and_negative_powers_use_repeated_multiplication() {
        let z = Complex64::new(0.9, 0.2);
        let mut expected = ONE;
        for _ in 0..13 {
            expected = expected * z;
        }
        assert!(close(z.integer_pow(13), expected, 1e-12));
        assert!(close(z.integer_pow(-3), (z * z * z).inverse(), 1e-12));
    }

    #[test]
    fn negative_power_on_imaginary_axis_keeps_its_quadrant() {
        // A polar form built on atan(im / re) is undefined here and would
        // lose the sign of the real part for re < 0.
        let z = Complex64::new(0.0, 2.0);
        assert!(close(z.integer_pow(-1), Complex64::new(0.0, -0.5), 1e-15));

        let w = Complex64::new(-1.0, 1.0);
        assert!(close(w.integer_pow(11), w.integer_pow(10) * w, 1e-12));
        assert!(close(w.integer_pow(-2), Complex64::new(0.0, 0.5), 1e-15));
    }

    #[test]
    fn seeds_parse_from_text() {
        let z = Complex64::new(-0.75, 0.125);
        assert_eq!(z.to_string().parse::<Complex64>().unwrap(), z);
        assert!("banana".parse::<Complex64>().is_err());
    }
}
