use rayon::prelude::*;

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::field::IterationField;

const LUT_SIZE: usize = 256;

/// A color map backed by a gradient lookup table.
///
/// Escape counts are normalised by the field's observed maximum to a
/// position in `[0, 1]`, which is then linearly interpolated between
/// adjacent LUT entries. Points that never escaped hold the maximum, so they
/// land at the top end of the map.
#[derive(Clone)]
pub struct Palette {
    pub name: &'static str,
    colors: Vec<[u8; 4]>,
}

impl Palette {
    /// Build a palette from explicit colors, evenly spaced over `[0, 1]`.
    pub fn new(name: &'static str, colors: Vec<[u8; 4]>) -> crate::Result<Self> {
        if colors.is_empty() {
            return Err(RenderError::EmptyPalette(name));
        }
        Ok(Self { name, colors })
    }

    fn from_lut(name: &'static str, lut: [[u8; 4]; LUT_SIZE]) -> Self {
        Self {
            name,
            colors: lut.to_vec(),
        }
    }

    /// Look up a built-in palette by name, ignoring case.
    pub fn by_name(name: &str) -> Option<Self> {
        builtin_palettes()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Color for a normalised position `t` in `[0, 1]` (clamped).
    pub fn color_at(&self, t: f64) -> [u8; 4] {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let idx = t * (self.colors.len() - 1) as f64;
        let lo = idx.floor() as usize;
        let hi = (lo + 1).min(self.colors.len() - 1);
        lerp_color(self.colors[lo], self.colors[hi], idx - idx.floor())
    }

    /// Colorize a whole field into an RGBA buffer.
    pub fn colorize(&self, field: &IterationField) -> RenderBuffer {
        let max = field.observed_max();
        let mut buffer = RenderBuffer::new(field.width, field.height);
        buffer
            .pixels
            .par_chunks_mut(4)
            .zip(field.data.par_iter())
            .for_each(|(pixel, &n)| {
                pixel.copy_from_slice(&self.color_at(normalize(n, max)));
            });
        buffer
    }
}

impl Default for Palette {
    fn default() -> Self {
        viridis()
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette").field("name", &self.name).finish()
    }
}

/// `n / max`, or `0` for an all-zero field.
#[inline]
fn normalize(n: u32, max: u32) -> f64 {
    if max == 0 {
        0.0
    } else {
        n as f64 / max as f64
    }
}

/// One byte of intensity per pixel, `round(n / max · 255)`.
pub fn grayscale(field: &IterationField) -> Vec<u8> {
    let max = field.observed_max();
    field
        .data
        .par_iter()
        .map(|&n| (normalize(n, max) * 255.0).round() as u8)
        .collect()
}

fn lerp_color(a: [u8; 4], b: [u8; 4], t: f64) -> [u8; 4] {
    let inv = 1.0 - t;
    [
        (a[0] as f64 * inv + b[0] as f64 * t).round() as u8,
        (a[1] as f64 * inv + b[1] as f64 * t).round() as u8,
        (a[2] as f64 * inv + b[2] as f64 * t).round() as u8,
        255,
    ]
}

// ---------------------------------------------------------------------------
// Builtin palettes
// ---------------------------------------------------------------------------

pub fn builtin_palettes() -> Vec<Palette> {
    vec![viridis(), brg(), fire(), grayscale_palette()]
}

/// Build a gradient LUT by interpolating between color stops.
fn gradient_lut(stops: &[(f64, [u8; 3])]) -> [[u8; 4]; LUT_SIZE] {
    std::array::from_fn(|i| {
        let t = i as f64 / (LUT_SIZE - 1) as f64;
        let lo = stops.iter().rposition(|&(pos, _)| pos <= t).unwrap_or(0);
        let hi = (lo + 1).min(stops.len() - 1);
        let (lo_t, lo_c) = stops[lo];
        let (hi_t, hi_c) = stops[hi];
        let frac = if (hi_t - lo_t).abs() < 1e-10 {
            0.0
        } else {
            ((t - lo_t) / (hi_t - lo_t)).clamp(0.0, 1.0)
        };
        lerp_color(
            [lo_c[0], lo_c[1], lo_c[2], 255],
            [hi_c[0], hi_c[1], hi_c[2], 255],
            frac,
        )
    })
}

/// Perceptually uniform purple → teal → yellow.
fn viridis() -> Palette {
    let stops = &[
        (0.0, [68, 1, 84]),
        (0.125, [71, 45, 123]),
        (0.25, [59, 82, 139]),
        (0.375, [44, 114, 142]),
        (0.5, [33, 145, 140]),
        (0.625, [40, 174, 128]),
        (0.75, [94, 201, 98]),
        (0.875, [173, 220, 48]),
        (1.0, [253, 231, 37]),
    ];
    Palette::from_lut("Viridis", gradient_lut(stops))
}

/// Blue → red → green.
fn brg() -> Palette {
    let stops = &[(0.0, [0, 0, 255]), (0.5, [255, 0, 0]), (1.0, [0, 255, 0])];
    Palette::from_lut("Brg", gradient_lut(stops))
}

fn fire() -> Palette {
    let stops = &[
        (0.0, [0, 0, 0]),
        (0.25, [128, 0, 0]),
        (0.5, [255, 128, 0]),
        (0.75, [255, 255, 0]),
        (1.0, [255, 255, 255]),
    ];
    Palette::from_lut("Fire", gradient_lut(stops))
}

fn grayscale_palette() -> Palette {
    let stops = &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])];
    Palette::from_lut("Grayscale", gradient_lut(stops))
}
