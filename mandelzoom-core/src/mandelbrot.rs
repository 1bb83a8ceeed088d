use crate::complex::Complex;
use crate::fractal::{quadratic_escape, EscapeKernel, FractalParams};

/// The Mandelbrot set: `z₀ = c`, `z_{k+1} = z_k² + c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mandelbrot {
    params: FractalParams,
}

impl Mandelbrot {
    pub fn new(params: FractalParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FractalParams {
        &self.params
    }
}

/// Returns `true` if `c` lies inside the main cardioid.
///
/// Closed-form, so about a third of the default view skips the loop.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

impl EscapeKernel for Mandelbrot {
    fn escape_time(&self, c: Complex) -> u32 {
        // Both regions are bounded orbits, so the answer is the bound itself.
        if in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im) {
            return self.params.max_iterations;
        }
        quadratic_escape(c, c, self.params.max_iterations)
    }

    fn max_iterations(&self) -> u32 {
        self.params.max_iterations
    }
}
