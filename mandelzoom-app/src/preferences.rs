use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use mandelzoom_core::{FractalParams, RasterDimensions, Viewport};
use mandelzoom_render::{Palette, TileGrid};

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppPreferences {
    #[serde(default = "default_window_width")]
    pub window_width: f32,
    #[serde(default = "default_window_height")]
    pub window_height: f32,
    /// Resolution of the rendered field. Fixed for the session.
    #[serde(default = "default_raster_width")]
    pub raster_width: u32,
    #[serde(default = "default_raster_height")]
    pub raster_height: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_tile_rows")]
    pub tile_rows: u32,
    #[serde(default = "default_tile_cols")]
    pub tile_cols: u32,
    /// Worker thread count for the render pool. 0 picks one per core.
    #[serde(default)]
    pub worker_threads: usize,
    /// Region shown at startup and restored by Reset.
    #[serde(default)]
    pub default_viewport: Viewport,
    #[serde(default = "default_palette")]
    pub palette: String,
    /// Where Save writes its images. When empty, an `images/` folder next to the executable is used.
    #[serde(default)]
    pub export_dir: String,
}

fn default_window_width() -> f32 {
    900.0
}
fn default_window_height() -> f32 {
    900.0
}
fn default_raster_width() -> u32 {
    RasterDimensions::DEFAULT.width()
}
fn default_raster_height() -> u32 {
    RasterDimensions::DEFAULT.height()
}
fn default_max_iterations() -> u32 {
    FractalParams::DEFAULT_MAX_ITERATIONS
}
fn default_tile_rows() -> u32 {
    TileGrid::DEFAULT.rows
}
fn default_tile_cols() -> u32 {
    TileGrid::DEFAULT.cols
}
fn default_palette() -> String {
    Palette::default().name.to_string()
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            raster_width: default_raster_width(),
            raster_height: default_raster_height(),
            max_iterations: default_max_iterations(),
            tile_rows: default_tile_rows(),
            tile_cols: default_tile_cols(),
            worker_threads: 0,
            default_viewport: Viewport::DEFAULT,
            palette: default_palette(),
            export_dir: String::new(),
        }
    }
}

impl AppPreferences {
    /// Load preferences from next to the executable, falling back to defaults.
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                    Ok(prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        let path = config_path();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    pub fn raster(&self) -> RasterDimensions {
        RasterDimensions::new(self.raster_width, self.raster_height).unwrap_or_else(|e| {
            warn!("{e}; using {}x{}", default_raster_width(), default_raster_height());
            RasterDimensions::DEFAULT
        })
    }

    pub fn fractal_params(&self) -> FractalParams {
        FractalParams::new(self.max_iterations).unwrap_or_else(|e| {
            warn!("{e}; using {}", default_max_iterations());
            FractalParams::default()
        })
    }

    pub fn tile_grid(&self) -> TileGrid {
        TileGrid::new(self.tile_rows, self.tile_cols).unwrap_or_else(|e| {
            warn!("{e}; using the default grid");
            TileGrid::DEFAULT
        })
    }

    pub fn palette(&self) -> Palette {
        Palette::by_name(&self.palette).unwrap_or_else(|| {
            warn!(name = %self.palette, "Unknown palette; using the default");
            Palette::default()
        })
    }

    pub fn export_directory(&self) -> PathBuf {
        if self.export_dir.is_empty() {
            crate::app_dir::images_directory()
        } else {
            PathBuf::from(&self.export_dir)
        }
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let prefs: AppPreferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs.raster(), RasterDimensions::DEFAULT);
        assert_eq!(prefs.tile_grid(), TileGrid::DEFAULT);
        assert_eq!(prefs.default_viewport, Viewport::DEFAULT);
        assert_eq!(prefs.fractal_params().max_iterations, 256);
        assert_eq!(prefs.palette().name, "Viridis");
    }

    #[test]
    fn out_of_range_values_fall_back() {
        let prefs: AppPreferences = serde_json::from_str(
            r#"{"raster_width": 0, "max_iterations": 0, "tile_rows": 0, "palette": "nope"}"#,
        )
        .unwrap();
        assert_eq!(prefs.raster(), RasterDimensions::DEFAULT);
        assert_eq!(prefs.fractal_params(), FractalParams::default());
        assert_eq!(prefs.tile_grid(), TileGrid::DEFAULT);
        assert_eq!(prefs.palette().name, "Viridis");
    }

    #[test]
    fn inverted_viewport_is_a_parse_error() {
        let json = r#"{"default_viewport": {"xmin": 1, "xmax": -1, "ymin": 0, "ymax": 1}}"#;
        assert!(serde_json::from_str::<AppPreferences>(json).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let mut prefs = AppPreferences::default();
        prefs.palette = "Fire".into();
        prefs.worker_threads = 3;
        let json = serde_json::to_string(&prefs).unwrap();
        let back: AppPreferences = serde_json::from_str(&json).unwrap();
        assert_eq!(back.palette, "Fire");
        assert_eq!(back.worker_threads, 3);
    }
}
