use crate::complex::Complex;
use crate::fractal::{quadratic_escape, EscapeKernel, FractalParams};

/// A filled Julia set: `z₀ = c` (the pixel), `z_{k+1} = z_k² + k` for a fixed
/// parameter `k`.
///
/// Same escape semantics as [`Mandelbrot`](crate::Mandelbrot); only the
/// additive term changes, so it drops into the renderer unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Julia {
    k: Complex,
    params: FractalParams,
}

impl Julia {
    /// Douady's rabbit.
    pub const DEFAULT_K: Complex = Complex {
        re: -0.123,
        im: 0.745,
    };

    pub fn new(k: Complex, params: FractalParams) -> Self {
        Self { k, params }
    }

    pub fn k(&self) -> Complex {
        self.k
    }
}

impl Default for Julia {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K, FractalParams::default())
    }
}

impl EscapeKernel for Julia {
    fn escape_time(&self, c: Complex) -> u32 {
        quadratic_escape(c, self.k, self.params.max_iterations)
    }

    fn max_iterations(&self) -> u32 {
        self.params.max_iterations
    }
}
