use mandelzoom_core::{CoordinateMapper, RasterDimensions, Viewport};

use crate::error::RenderError;

/// Shape of the tile grid a viewport is split into.
///
/// Tiles are the unit of work handed to the pool, so the grid trades
/// scheduling granularity against per-task overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: u32,
    pub cols: u32,
}

impl TileGrid {
    pub const DEFAULT: Self = Self { rows: 5, cols: 5 };

    pub fn new(rows: u32, cols: u32) -> crate::Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(RenderError::InvalidGrid { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn tile_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One cell of the grid, in both pixel space and the complex plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tile {
    /// Row of this tile within the grid.
    pub grid_row: u32,
    /// Column of this tile within the grid.
    pub grid_col: u32,
    /// Complex-plane rectangle covered by this tile.
    pub viewport_slice: Viewport,
    /// Pixel size of this tile.
    pub pixel_slice: RasterDimensions,
    /// Field row of the tile's top edge.
    pub row_offset: u32,
    /// Field column of the tile's left edge.
    pub col_offset: u32,
}

impl Tile {
    pub fn pixel_count(&self) -> usize {
        self.pixel_slice.pixel_count()
    }
}

/// Pixel breakpoints `⌊i·extent/parts⌋` for `i = 0..=parts`.
///
/// Remainder pixels are spread across the strips, so no strip differs from
/// another by more than one pixel and the last breakpoint is always `extent`.
fn breakpoints(extent: u32, parts: u32) -> Vec<u32> {
    (0..=parts)
        .map(|i| (i as u64 * extent as u64 / parts as u64) as u32)
        .collect()
}

/// Split `viewport` × `raster` into `grid.rows × grid.cols` tiles, row-major.
///
/// Pixel slices partition the raster exactly. Viewport slices are cut at the
/// same fractional breakpoints through [`CoordinateMapper`], with the outer
/// edges pinned to the viewport bounds, so neighbouring tiles share their
/// edge values bit-for-bit. Tile row 0 is the top of the image (`ymax`).
pub fn partition(
    viewport: Viewport,
    raster: RasterDimensions,
    grid: TileGrid,
) -> crate::Result<Vec<Tile>> {
    if grid.rows == 0 || grid.cols == 0 {
        return Err(RenderError::InvalidGrid {
            rows: grid.rows,
            cols: grid.cols,
        });
    }
    if raster.width() < grid.cols || raster.height() < grid.rows {
        return Err(RenderError::InvalidRaster {
            width: raster.width(),
            height: raster.height(),
            rows: grid.rows,
            cols: grid.cols,
        });
    }

    let xs = breakpoints(raster.width(), grid.cols);
    let ys = breakpoints(raster.height(), grid.rows);
    let mapper = CoordinateMapper::new(viewport, raster);

    let re_edges: Vec<f64> = xs
        .iter()
        .enumerate()
        .map(|(i, &x)| match i {
            0 => viewport.xmin(),
            i if i == xs.len() - 1 => viewport.xmax(),
            _ => mapper.pixel_to_complex(x as f64, 0.0).re,
        })
        .collect();
    let im_edges: Vec<f64> = ys
        .iter()
        .enumerate()
        .map(|(j, &y)| match j {
            0 => viewport.ymax(),
            j if j == ys.len() - 1 => viewport.ymin(),
            _ => mapper.pixel_to_complex(0.0, y as f64).im,
        })
        .collect();

    let mut tiles = Vec::with_capacity(grid.tile_count());
    for r in 0..grid.rows as usize {
        for c in 0..grid.cols as usize {
            let viewport_slice =
                Viewport::new(re_edges[c], re_edges[c + 1], im_edges[r + 1], im_edges[r])?;
            let pixel_slice = RasterDimensions::new(xs[c + 1] - xs[c], ys[r + 1] - ys[r])?;
            tiles.push(Tile {
                grid_row: r as u32,
                grid_col: c as u32,
                viewport_slice,
                pixel_slice,
                row_offset: ys[r],
                col_offset: xs[c],
            });
        }
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(w: u32, h: u32) -> RasterDimensions {
        RasterDimensions::new(w, h).unwrap()
    }

    fn assert_exact_cover(tiles: &[Tile], w: u32, h: u32) {
        let mut covered = vec![0u8; w as usize * h as usize];
        for tile in tiles {
            let ps = tile.pixel_slice;
            for py in tile.row_offset..tile.row_offset + ps.height() {
                for px in tile.col_offset..tile.col_offset + ps.width() {
                    covered[py as usize * w as usize + px as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&n| n == 1), "every pixel exactly once");
    }

    #[test]
    fn default_grid_covers_divisible_raster() {
        let tiles = partition(Viewport::DEFAULT, raster(800, 800), TileGrid::DEFAULT).unwrap();
        assert_eq!(tiles.len(), 25);
        assert!(tiles
            .iter()
            .all(|t| t.pixel_slice == raster(160, 160)));
        assert_exact_cover(&tiles, 800, 800);
    }

    #[test]
    fn remainder_pixels_are_distributed() {
        let grid = TileGrid::new(5, 5).unwrap();
        for (w, h) in [(801, 799), (7, 9), (5, 5), (123, 64)] {
            let tiles = partition(Viewport::DEFAULT, raster(w, h), grid).unwrap();
            assert_exact_cover(&tiles, w, h);
            let widths: Vec<u32> = tiles.iter().map(|t| t.pixel_slice.width()).collect();
            let min = widths.iter().min().unwrap();
            let max = widths.iter().max().unwrap();
            assert!(max - min <= 1, "{w}×{h}: widths {widths:?}");
        }
    }

    #[test]
    fn non_square_grid() {
        let grid = TileGrid::new(3, 7).unwrap();
        let tiles = partition(Viewport::DEFAULT, raster(100, 40), grid).unwrap();
        assert_eq!(tiles.len(), 21);
        assert_eq!(tiles[7].grid_row, 1);
        assert_eq!(tiles[7].grid_col, 0);
        assert_exact_cover(&tiles, 100, 40);
    }

    #[test]
    fn raster_smaller_than_grid_rejected() {
        let err = partition(Viewport::DEFAULT, raster(3, 3), TileGrid::DEFAULT).unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidRaster {
                width: 3,
                height: 3,
                rows: 5,
                cols: 5
            }
        ));
        assert!(partition(Viewport::DEFAULT, raster(10, 4), TileGrid::DEFAULT).is_err());
    }

    #[test]
    fn zero_grid_rejected() {
        assert!(TileGrid::new(0, 5).is_err());
        let grid = TileGrid { rows: 5, cols: 0 };
        assert!(matches!(
            partition(Viewport::DEFAULT, raster(10, 10), grid),
            Err(RenderError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn slices_tile_the_viewport() {
        let vp = Viewport::new(-1.0, 0.5, -0.25, 0.75).unwrap();
        let grid = TileGrid::new(4, 3).unwrap();
        let tiles = partition(vp, raster(301, 203), grid).unwrap();

        // Outer edges match the viewport exactly.
        assert_eq!(tiles[0].viewport_slice.xmin(), vp.xmin());
        assert_eq!(tiles[0].viewport_slice.ymax(), vp.ymax());
        let last = tiles.last().unwrap().viewport_slice;
        assert_eq!(last.xmax(), vp.xmax());
        assert_eq!(last.ymin(), vp.ymin());

        // Neighbours share edges bit-for-bit.
        for r in 0..4usize {
            for c in 0..3usize {
                let t = tiles[r * 3 + c].viewport_slice;
                if c + 1 < 3 {
                    assert_eq!(t.xmax(), tiles[r * 3 + c + 1].viewport_slice.xmin());
                }
                if r + 1 < 4 {
                    assert_eq!(t.ymin(), tiles[(r + 1) * 3 + c].viewport_slice.ymax());
                }
            }
        }
    }

    #[test]
    fn slices_are_congruent_with_pixels() {
        let vp = Viewport::DEFAULT;
        let r = raster(640, 480);
        let mapper = CoordinateMapper::new(vp, r);
        for tile in partition(vp, r, TileGrid::DEFAULT).unwrap() {
            let top_left =
                mapper.pixel_to_complex(tile.col_offset as f64, tile.row_offset as f64);
            let slice = tile.viewport_slice;
            assert!((slice.xmin() - top_left.re).abs() < 1e-12);
            assert!((slice.ymax() - top_left.im).abs() < 1e-12);
            let per_px_re = slice.width() / tile.pixel_slice.width() as f64;
            let per_px_im = slice.height() / tile.pixel_slice.height() as f64;
            assert!((per_px_re - vp.width() / 640.0).abs() < 1e-12);
            assert!((per_px_im - vp.height() / 480.0).abs() < 1e-12);
        }
    }
}
