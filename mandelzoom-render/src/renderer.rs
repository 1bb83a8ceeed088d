use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use mandelzoom_core::{
    CoordinateMapper, EscapeKernel, FractalParams, Mandelbrot, RasterDimensions, Viewport,
};

use crate::error::RenderError;
use crate::field::IterationField;
use crate::tile::{partition, Tile, TileGrid};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Tracks the current render generation for cancellation and progress.
///
/// A render snapshots the generation when it starts and checks it before
/// each tile; advancing it makes every not-yet-started tile bail out, and the
/// render then fails with [`RenderError::Cancelled`]. The progress counters
/// let a UI draw a progress bar.
#[derive(Debug)]
pub struct RenderCancel {
    generation: AtomicU64,
    progress_done: AtomicUsize,
    progress_total: AtomicUsize,
}

impl RenderCancel {
    pub fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
            progress_done: AtomicUsize::new(0),
            progress_total: AtomicUsize::new(0),
        }
    }

    /// Cancel whatever render is in flight by advancing the generation.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn reset_progress(&self, total: usize) {
        self.progress_total.store(total, Ordering::Relaxed);
        self.progress_done.store(0, Ordering::Relaxed);
    }

    fn inc_progress(&self) {
        self.progress_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Tiles finished so far, as `(done, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.progress_done.load(Ordering::Relaxed),
            self.progress_total.load(Ordering::Relaxed),
        )
    }
}

impl Default for RenderCancel {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// A completed render. Only produced when every tile succeeded.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub field: IterationField,
    pub elapsed: Duration,
    pub tiles_rendered: usize,
}

// ---------------------------------------------------------------------------
// Per-tile rendering
// ---------------------------------------------------------------------------

/// Evaluate every pixel of one tile, row-major.
///
/// Pixels are mapped through the whole-image `mapper` at their global
/// coordinates, so a field entry does not depend on how the raster was cut.
fn render_tile<K: EscapeKernel>(
    kernel: &K,
    mapper: &CoordinateMapper,
    tile: &Tile,
) -> crate::Result<Vec<u32>> {
    let fail = |reason: String| RenderError::TileComputeFailure {
        row: tile.grid_row,
        col: tile.grid_col,
        reason,
    };

    let raster = mapper.raster();
    let ps = tile.pixel_slice;
    if tile.col_offset as u64 + ps.width() as u64 > raster.width() as u64
        || tile.row_offset as u64 + ps.height() as u64 > raster.height() as u64
    {
        return Err(fail(format!(
            "pixel slice {}×{} at ({}, {}) exceeds raster {}×{}",
            ps.width(),
            ps.height(),
            tile.col_offset,
            tile.row_offset,
            raster.width(),
            raster.height()
        )));
    }

    let max_iter = kernel.max_iterations();
    let mut data = Vec::with_capacity(tile.pixel_count());
    for py in tile.row_offset..tile.row_offset + ps.height() {
        for px in tile.col_offset..tile.col_offset + ps.width() {
            let c = mapper.pixel_to_complex(px as f64, py as f64);
            let n = kernel.escape_time(c);
            if n > max_iter {
                return Err(fail(format!(
                    "kernel returned {n} at pixel ({px}, {py}), above bound {max_iter}"
                )));
            }
            data.push(n);
        }
    }
    Ok(data)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tiled renderer backed by a long-lived worker pool.
///
/// The pool is built once and reused; each call to [`render`](Self::render)
/// is self-contained (viewport, raster, grid, kernel), so nothing carries
/// over between frames.
pub struct Renderer {
    pool: rayon::ThreadPool,
}

impl Renderer {
    /// Build a renderer with `threads` workers; `0` picks the available
    /// hardware parallelism.
    pub fn new(threads: usize) -> crate::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tile-worker-{i}"))
            .build()
            .map_err(|e| RenderError::ThreadPool(e.to_string()))?;
        debug!(threads = pool.current_num_threads(), "Created render pool");
        Ok(Self { pool })
    }

    /// Process-wide renderer sized to the hardware, built on first use.
    pub fn shared() -> crate::Result<&'static Renderer> {
        static SHARED: OnceLock<Renderer> = OnceLock::new();
        if let Some(renderer) = SHARED.get() {
            return Ok(renderer);
        }
        let renderer = Renderer::new(0)?;
        Ok(SHARED.get_or_init(|| renderer))
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Render a full frame.
    ///
    /// Tiles run in parallel; results are collected in tile order and blitted
    /// by position, so the field is identical for any pool size or schedule.
    /// Any tile failure or a cancellation fails the whole render.
    pub fn render<K: EscapeKernel>(
        &self,
        kernel: &K,
        viewport: Viewport,
        raster: RasterDimensions,
        grid: TileGrid,
        cancel: &RenderCancel,
    ) -> crate::Result<RenderOutcome> {
        self.render_from(kernel, viewport, raster, grid, cancel, cancel.generation())
    }

    /// Like [`render`](Self::render), but any cancel issued after
    /// `generation` was read aborts the frame, including one issued before
    /// this call. Lets a caller snapshot the generation when a request is
    /// queued rather than when it starts.
    pub fn render_from<K: EscapeKernel>(
        &self,
        kernel: &K,
        viewport: Viewport,
        raster: RasterDimensions,
        grid: TileGrid,
        cancel: &RenderCancel,
        generation: u64,
    ) -> crate::Result<RenderOutcome> {
        let start = Instant::now();

        let tiles = partition(viewport, raster, grid)?;
        let tile_count = tiles.len();
        debug!(
            tile_count,
            width = raster.width(),
            height = raster.height(),
            %viewport,
            "Starting tiled render"
        );
        cancel.reset_progress(tile_count);

        let mapper = CoordinateMapper::new(viewport, raster);
        let tile_data: Vec<Vec<u32>> = self.pool.install(|| {
            tiles
                .par_iter()
                .map(|tile| {
                    if cancel.generation() != generation {
                        return Err(RenderError::Cancelled);
                    }
                    let data = render_tile(kernel, &mapper, tile)?;
                    cancel.inc_progress();
                    Ok(data)
                })
                .collect::<crate::Result<Vec<_>>>()
        })?;

        let mut field = IterationField::new(viewport, raster, kernel.max_iterations());
        for (tile, data) in tiles.iter().zip(&tile_data) {
            field.blit_tile(tile, data);
        }

        let elapsed = start.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis(),
            tiles_rendered = tile_count,
            "Render complete"
        );

        Ok(RenderOutcome {
            field,
            elapsed,
            tiles_rendered: tile_count,
        })
    }
}

/// Render the Mandelbrot set over `viewport` with the default 5×5 grid on
/// the shared pool. Blocks until the field is complete or the render fails.
pub fn render(
    viewport: Viewport,
    raster: RasterDimensions,
    max_iterations: u32,
) -> crate::Result<IterationField> {
    let kernel = Mandelbrot::new(FractalParams::new(max_iterations)?);
    let outcome = Renderer::shared()?.render(
        &kernel,
        viewport,
        raster,
        TileGrid::DEFAULT,
        &RenderCancel::new(),
    )?;
    Ok(outcome.field)
}
