use crate::complex::Complex;
use crate::viewport::{RasterDimensions, Viewport};

/// Linear map between pixel space and the complex plane.
///
/// Pixel `(0, 0)` is the top-left corner of the image and maps to
/// `(xmin, ymax)`: increasing pixel-x increases the real part, increasing
/// pixel-y *decreases* the imaginary part. The renderer and the selection
/// handler both go through this type, so they cannot disagree.
///
/// Nothing is clamped. Pixels outside the raster map to points outside the
/// viewport and vice versa; validating a selection is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    viewport: Viewport,
    raster: RasterDimensions,
}

impl CoordinateMapper {
    pub fn new(viewport: Viewport, raster: RasterDimensions) -> Self {
        Self { viewport, raster }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn raster(&self) -> RasterDimensions {
        self.raster
    }

    /// Map (possibly fractional) pixel coordinates to the complex plane.
    #[inline]
    pub fn pixel_to_complex(&self, x: f64, y: f64) -> Complex {
        let vp = &self.viewport;
        Complex::new(
            vp.xmin() + (x / self.raster.width() as f64) * vp.width(),
            vp.ymax() - (y / self.raster.height() as f64) * vp.height(),
        )
    }

    /// Exact algebraic inverse of [`pixel_to_complex`](Self::pixel_to_complex).
    #[inline]
    pub fn complex_to_pixel(&self, c: Complex) -> (f64, f64) {
        let vp = &self.viewport;
        (
            (c.re - vp.xmin()) / vp.width() * self.raster.width() as f64,
            (vp.ymax() - c.im) / vp.height() * self.raster.height() as f64,
        )
    }

    /// Integer pixel whose top-left corner is nearest to `c`, if it lies on
    /// the raster.
    pub fn pixel_of(&self, c: Complex) -> Option<(u32, u32)> {
        let (x, y) = self.complex_to_pixel(c);
        let (x, y) = (x.round(), y.round());
        let in_x = x >= 0.0 && x < self.raster.width() as f64;
        let in_y = y >= 0.0 && y < self.raster.height() as f64;
        (in_x && in_y).then_some((x as u32, y as u32))
    }
}
