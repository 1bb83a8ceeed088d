//! PNG export with embedded metadata (tEXt chunks).

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use mandelzoom_core::Viewport;

use crate::error::RenderError;
use crate::field::IterationField;
use crate::palette::{grayscale, Palette};

pub const COLOR_FILE_NAME: &str = "mandelbrot_color.png";
pub const GRAY_FILE_NAME: &str = "mandelbrot_gray.png";

/// What was rendered, embedded in every exported PNG.
#[derive(Debug, Clone)]
pub struct ExportMetadata {
    pub viewport: Viewport,
    pub max_iterations: u32,
    pub palette_name: String,
}

fn export_err(context: &str) -> impl Fn(png::EncodingError) -> RenderError + '_ {
    move |e| RenderError::Export(format!("{context}: {e}"))
}

/// Encode 8-bit pixels of the given color type to `path`.
fn write_png(
    pixels: &[u8],
    width: u32,
    height: u32,
    color: png::ColorType,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    let file = File::create(path).map_err(|e| {
        RenderError::Export(format!("failed to create {}: {e}", path.display()))
    })?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    for (key, value) in metadata_pairs(metadata, width, height) {
        encoder
            .add_text_chunk(key, value)
            .map_err(export_err("failed to add text chunk"))?;
    }

    let mut writer = encoder
        .write_header()
        .map_err(export_err("failed to write PNG header"))?;
    writer
        .write_image_data(pixels)
        .map_err(export_err("failed to write PNG image data"))?;

    debug!("Exported {width}x{height} PNG to {}", path.display());
    Ok(())
}

fn metadata_pairs(meta: &ExportMetadata, width: u32, height: u32) -> Vec<(String, String)> {
    let vp = meta.viewport;
    vec![
        ("Software".into(), "MandelZoom".into()),
        (
            "Description".into(),
            format!(
                "Mandelbrot - Region: {vp}, Iterations: {}",
                meta.max_iterations
            ),
        ),
        ("MandelZoom.XMin".into(), vp.xmin().to_string()),
        ("MandelZoom.XMax".into(), vp.xmax().to_string()),
        ("MandelZoom.YMin".into(), vp.ymin().to_string()),
        ("MandelZoom.YMax".into(), vp.ymax().to_string()),
        (
            "MandelZoom.MaxIterations".into(),
            meta.max_iterations.to_string(),
        ),
        ("MandelZoom.Palette".into(), meta.palette_name.clone()),
        ("MandelZoom.Resolution".into(), format!("{width}x{height}")),
    ]
}

/// Write a field through `palette` as an RGBA PNG.
pub fn export_color_png(
    field: &IterationField,
    palette: &Palette,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    let buffer = palette.colorize(field);
    write_png(
        &buffer.pixels,
        buffer.width,
        buffer.height,
        png::ColorType::Rgba,
        path,
        metadata,
    )
}

/// Write a field as an 8-bit grayscale PNG.
pub fn export_gray_png(
    field: &IterationField,
    path: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<()> {
    write_png(
        &grayscale(field),
        field.width,
        field.height,
        png::ColorType::Grayscale,
        path,
        metadata,
    )
}

/// Write both the color and grayscale images into `dir`, creating it if
/// needed. Returns the two paths, color first.
pub fn save_pair(
    field: &IterationField,
    palette: &Palette,
    dir: &Path,
    metadata: &ExportMetadata,
) -> crate::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir).map_err(|e| {
        RenderError::Export(format!("failed to create {}: {e}", dir.display()))
    })?;
    let color_path = dir.join(COLOR_FILE_NAME);
    let gray_path = dir.join(GRAY_FILE_NAME);
    export_color_png(field, palette, &color_path, metadata)?;
    export_gray_png(field, &gray_path, metadata)?;
    info!(
        color = %color_path.display(),
        gray = %gray_path.display(),
        "Saved images"
    );
    Ok((color_path, gray_path))
}
