use tracing::debug;

use crate::complex::Complex;
use crate::error::CoreError;

/// An axis-aligned rectangle of the complex plane.
///
/// Always satisfies `xmin < xmax` and `ymin < ymax` with finite bounds: the
/// only ways to build one are the validating constructors. It is a plain
/// `Copy` value, so a zoom produces a new viewport instead of editing the one
/// an in-flight render is reading.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Viewport {
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl<'de> serde::Deserialize<'de> for Viewport {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            xmin: f64,
            xmax: f64,
            ymin: f64,
            ymax: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.xmin, raw.xmax, raw.ymin, raw.ymax).map_err(serde::de::Error::custom)
    }
}

impl Viewport {
    /// Startup view: the whole Mandelbrot set, `[-2, 1] × [-1.5, 1.5]`.
    pub const DEFAULT: Self = Self {
        xmin: -2.0,
        xmax: 1.0,
        ymin: -1.5,
        ymax: 1.5,
    };

    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> crate::Result<Self> {
        if ![xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite()) {
            return Err(CoreError::InvalidViewport {
                reason: format!("bounds must be finite, got [{xmin}, {xmax}] × [{ymin}, {ymax}]"),
            });
        }
        if xmin >= xmax {
            return Err(CoreError::InvalidViewport {
                reason: format!("real extent must be positive, got [{xmin}, {xmax}]"),
            });
        }
        if ymin >= ymax {
            return Err(CoreError::InvalidViewport {
                reason: format!("imaginary extent must be positive, got [{ymin}, {ymax}]"),
            });
        }
        Ok(Self {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Smallest viewport spanned by two opposite corners, in either order.
    ///
    /// Each axis is normalised with `min`/`max`, so a selection dragged in any
    /// direction yields the same rectangle. Collapsed selections are rejected.
    pub fn from_corners(a: Complex, b: Complex) -> crate::Result<Self> {
        let vp = Self::new(a.re.min(b.re), a.re.max(b.re), a.im.min(b.im), a.im.max(b.im));
        if let Err(ref e) = vp {
            debug!(%a, %b, error = %e, "Rejected selection");
        }
        vp
    }

    #[inline]
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    #[inline]
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    #[inline]
    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    #[inline]
    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    /// Extent along the real axis.
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Extent along the imaginary axis.
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center(&self) -> Complex {
        Complex::new(
            self.xmin + self.width() / 2.0,
            self.ymin + self.height() / 2.0,
        )
    }

    /// Closed-interval containment test.
    pub fn contains(&self, c: Complex) -> bool {
        (self.xmin..=self.xmax).contains(&c.re) && (self.ymin..=self.ymax).contains(&c.im)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] × [{}, {}]",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Pixel resolution of an output field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct RasterDimensions {
    width: u32,
    height: u32,
}

impl<'de> serde::Deserialize<'de> for RasterDimensions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            width: u32,
            height: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.width, raw.height).map_err(serde::de::Error::custom)
    }
}

impl RasterDimensions {
    pub const DEFAULT: Self = Self {
        width: 800,
        height: 800,
    };

    pub fn new(width: u32, height: u32) -> crate::Result<Self> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidRaster { width, height });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for RasterDimensions {
    fn default() -> Self {
        Self::DEFAULT
    }
}
