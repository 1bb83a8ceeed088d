use mandelzoom_core::{RasterDimensions, Viewport};

use crate::tile::Tile;

/// Escape counts for a full frame, row-major, `height × width`.
///
/// Entry `(col, row)` is the count for the point the render's
/// `CoordinateMapper` assigns to that pixel. Values lie in
/// `[0, max_iterations]`; `max_iterations` itself means "did not diverge".
/// Keeping raw counts apart from colored pixels lets the caller recolor
/// without re-iterating.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationField {
    /// Complex-plane region the counts were sampled from.
    pub viewport: Viewport,
    pub width: u32,
    pub height: u32,
    pub max_iterations: u32,
    pub data: Vec<u32>,
}

impl IterationField {
    pub fn new(viewport: Viewport, raster: RasterDimensions, max_iterations: u32) -> Self {
        Self {
            viewport,
            width: raster.width(),
            height: raster.height(),
            max_iterations,
            data: vec![0; raster.pixel_count()],
        }
    }

    pub fn raster(&self) -> RasterDimensions {
        // Only ever built from a validated raster.
        RasterDimensions::new(self.width, self.height).unwrap_or_default()
    }

    /// Escape count at pixel `(col, row)`, or `None` off the raster.
    #[inline]
    pub fn get(&self, col: u32, row: u32) -> Option<u32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.data
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    /// One row of the field, left to right.
    pub fn row(&self, row: u32) -> Option<&[u32]> {
        if row >= self.height {
            return None;
        }
        let start = row as usize * self.width as usize;
        self.data.get(start..start + self.width as usize)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        self.data.chunks_exact(self.width.max(1) as usize)
    }

    /// Largest value present, used to normalise colors.
    pub fn observed_max(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Copy a tile's row-major counts into its region of the field.
    ///
    /// Tiles of one partition never overlap, so blit order does not matter.
    pub(crate) fn blit_tile(&mut self, tile: &Tile, tile_data: &[u32]) {
        let tw = tile.pixel_slice.width() as usize;
        let th = tile.pixel_slice.height() as usize;
        debug_assert_eq!(tile_data.len(), tw * th);
        let stride = self.width as usize;
        for (py, src) in tile_data.chunks_exact(tw).take(th).enumerate() {
            let dst_start = (tile.row_offset as usize + py) * stride + tile.col_offset as usize;
            self.data[dst_start..dst_start + tw].copy_from_slice(src);
        }
    }
}
