pub mod complex;
pub mod error;
pub mod fractal;
pub mod julia;
pub mod mandelbrot;
pub mod mapper;
pub mod viewport;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::CoreError;
pub use fractal::{EscapeKernel, FractalParams};
pub use julia::Julia;
pub use mandelbrot::Mandelbrot;
pub use mapper::CoordinateMapper;
pub use viewport::{RasterDimensions, Viewport};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
