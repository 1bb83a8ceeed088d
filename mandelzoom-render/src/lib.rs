pub mod buffer;
pub mod controller;
pub mod error;
pub mod export;
pub mod field;
pub mod palette;
pub mod renderer;
pub mod tile;

pub use buffer::RenderBuffer;
pub use controller::{ControllerState, ViewportController, MAX_HISTORY};
pub use error::RenderError;
pub use export::{export_color_png, export_gray_png, save_pair, ExportMetadata};
pub use field::IterationField;
pub use palette::{builtin_palettes, grayscale, Palette};
pub use renderer::{render, RenderCancel, RenderOutcome, Renderer};
pub use tile::{partition, Tile, TileGrid};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
