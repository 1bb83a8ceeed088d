use thiserror::Error;

/// Errors raised while validating core inputs, before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("invalid raster dimensions: {width}×{height} (both must be > 0)")]
    InvalidRaster { width: u32, height: u32 },
}
