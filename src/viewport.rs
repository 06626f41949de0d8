use crate::{complex::Complex64, error::EngineError, screen};

/// Rectangle of the complex plane mapped onto the image.
///
/// `start`/`end` bound the real axis at the left/right image edges, `top`/
/// `bottom` bound the imaginary axis at the first/last image rows.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub start: f64,
    pub end: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            start: -2.0,
            end: 2.0,
            top: -1.6,
            bottom: 1.6,
        }
    }
}

impl Viewport {
    pub fn new(start: f64, end: f64, top: f64, bottom: f64) -> Self {
        Self {
            start,
            end,
            top,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Starting point of the pixel at column `x`, row `y`.
    pub fn pixel_to_point(&self, x: u32, y: u32, size: screen::Size) -> Complex64 {
        Complex64::new(
            self.start + (self.end - self.start) * x as f64 / size.width as f64,
            self.top + (self.bottom - self.top) * y as f64 / size.height as f64,
        )
    }

    /// Pixel a trajectory point lands on, or `None` when it falls outside the
    /// image (non-finite points included).
    pub fn point_to_pixel(&self, point: Complex64, size: screen::Size) -> Option<(u32, u32)> {
        let column =
            (size.width as f64 * (point.re - self.start) / (self.end - self.start)).floor();
        let row =
            (size.height as f64 * (point.im - self.top) / (self.bottom - self.top)).floor();

        if column >= 0.0
            && column < size.width as f64
            && row >= 0.0
            && row < size.height as f64
        {
            Some((column as u32, row as u32))
        } else {
            None
        }
    }

    /// Grows (`amount > 0`) or shrinks (`amount < 0`) every edge by a tenth of
    /// the current extent per unit of `amount`.
    pub fn zoom(&mut self, amount: f64) {
        let width = self.width();
        let height = self.height();
        self.start -= 0.1 * width * amount;
        self.end += 0.1 * width * amount;
        self.top -= 0.1 * height * amount;
        self.bottom += 0.1 * height * amount;
    }

    /// Moves the view by a tenth of its extent per unit of `direction`.
    pub fn shift(&mut self, direction: Complex64) {
        let dx = self.width() * direction.re * 0.1;
        let dy = self.height() * direction.im * 0.1;
        self.start += dx;
        self.end += dx;
        self.top += dy;
        self.bottom += dy;
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let finite = [self.start, self.end, self.top, self.bottom]
            .iter()
            .all(|bound| bound.is_finite());
        if !finite || self.width() == 0.0 || self.height() == 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "degenerate viewport {self:?}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: screen::Size = screen::Size {
        width: 16,
        height: 16,
    };

    #[test]
    fn corners_map_to_bounds() {
        let viewport = Viewport::default();
        assert_eq!(viewport.pixel_to_point(0, 0, SIZE), Complex64::new(-2.0, -1.6));
        assert_eq!(viewport.pixel_to_point(8, 8, SIZE), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn pixel_origins_map_back_to_their_pixel() {
        // Square view with power-of-two steps so the round trip is exact.
        let viewport = Viewport::new(-2.0, 2.0, -2.0, 2.0);
        for (x, y) in [(0, 0), (3, 11), (15, 15), (8, 0)] {
            let point = viewport.pixel_to_point(x, y, SIZE);
            assert_eq!(viewport.point_to_pixel(point, SIZE), Some((x, y)));
        }
    }

    #[test]
    fn points_outside_the_image_have_no_pixel() {
        let viewport = Viewport::default();
        assert_eq!(viewport.point_to_pixel(Complex64::new(2.0, 0.0), SIZE), None);
        assert_eq!(viewport.point_to_pixel(Complex64::new(-2.01, 0.0), SIZE), None);
        assert_eq!(viewport.point_to_pixel(Complex64::new(0.0, 1.7), SIZE), None);
        assert_eq!(viewport.point_to_pixel(Complex64::new(f64::NAN, 0.0), SIZE), None);
        assert_eq!(
            viewport.point_to_pixel(Complex64::new(f64::INFINITY, 0.0), SIZE),
            None
        );
    }

    #[test]
    fn zoom_and_shift_keep_the_aspect() {
        let mut viewport = Viewport::default();
        viewport.zoom(-1.0);
        assert!((viewport.width() - 3.2).abs() < 1e-12);
        assert!((viewport.height() - 2.56).abs() < 1e-12);

        let before = viewport;
        viewport.shift(Complex64::new(1.0, 0.0));
        assert!((viewport.start - before.start - 0.32).abs() < 1e-12);
        assert_eq!(viewport.top, before.top);
    }

    #[test]
    fn degenerate_viewports_are_rejected() {
        assert!(Viewport::default().validate().is_ok());
        assert!(Viewport::new(1.0, 1.0, 0.0, 1.0).validate().is_err());
        assert!(Viewport::new(0.0, 1.0, f64::NAN, 1.0).validate().is_err());
    }
}
