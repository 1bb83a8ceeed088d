use thiserror::Error;

/// Errors originating from the rendering pipeline.
///
/// Every variant is surfaced synchronously to the caller; nothing is retried
/// and no partially assembled field ever escapes alongside an error.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("raster {width}×{height} is too small for a {rows}×{cols} tile grid")]
    InvalidRaster {
        width: u32,
        height: u32,
        rows: u32,
        cols: u32,
    },

    #[error("invalid tile grid: {rows}×{cols} (both must be > 0)")]
    InvalidGrid { rows: u32, cols: u32 },

    #[error("tile ({row}, {col}) failed: {reason}")]
    TileComputeFailure { row: u32, col: u32, reason: String },

    #[error("palette {0:?} has no colors")]
    EmptyPalette(&'static str),

    #[error("a render is already in flight")]
    ConcurrentRenderRejected,

    #[error("render cancelled")]
    Cancelled,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Core(#[from] mandelzoom_core::CoreError),
}
