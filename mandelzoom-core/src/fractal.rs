use crate::complex::Complex;
use crate::error::CoreError;

/// Escape threshold on the modulus `|z|`.
pub const ESCAPE_RADIUS: f64 = 2.0;

/// `ESCAPE_RADIUS²`, so the hot loop compares `|z|²` and skips the square root.
pub const ESCAPE_RADIUS_SQ: f64 = ESCAPE_RADIUS * ESCAPE_RADIUS;

/// Parameters controlling escape-time iteration.
///
/// Deserialization goes through the same validation as [`FractalParams::new`],
/// so a hand-edited preferences file cannot smuggle in `max_iterations = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FractalParams {
    /// Iteration bound. A point that has not escaped after this many steps
    /// is reported with exactly this value ("did not diverge").
    pub max_iterations: u32,
}

impl<'de> serde::Deserialize<'de> for FractalParams {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            max_iterations: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.max_iterations).map_err(serde::de::Error::custom)
    }
}

impl FractalParams {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

    pub fn new(max_iterations: u32) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self { max_iterations })
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Per-point escape-time evaluation.
///
/// Implementations must be pure: the same `c` always yields the same count,
/// with no interior mutability, so the renderer can call them from any
/// number of worker threads at once. Renderers are generic over
/// `K: EscapeKernel` so the loop is monomorphised and inlined.
pub trait EscapeKernel: Sync {
    /// Number of iterations before the orbit of `c` leaves the disc of
    /// radius [`ESCAPE_RADIUS`], in `[0, max_iterations]`.
    fn escape_time(&self, c: Complex) -> u32;

    /// Upper bound of [`escape_time`](Self::escape_time).
    fn max_iterations(&self) -> u32;
}

/// Shared escape loop for `z ← z² + k` starting from `z₀`.
///
/// The modulus is tested *before* each step, so a starting point already
/// outside the disc returns `0`.
#[inline]
pub(crate) fn quadratic_escape(z0: Complex, k: Complex, max_iterations: u32) -> u32 {
    let mut z = z0;
    for n in 0..max_iterations {
        if z.norm_sq() > ESCAPE_RADIUS_SQ {
            return n;
        }
        z = z.square() + k;
    }
    max_iterations
}
