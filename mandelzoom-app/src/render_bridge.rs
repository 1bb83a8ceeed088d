use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tracing::{debug, info, warn};

use mandelzoom_render::{
    save_pair, ExportMetadata, IterationField, Palette, RenderError, ViewportController,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Work sent from the UI thread to the render worker.
pub(crate) enum RenderRequest {
    /// Render the controller's current viewport.
    Render,
    /// Zoom into the pixel rectangle spanned by two corners.
    Zoom { a: (f64, f64), b: (f64, f64) },
    Reset,
    Back,
    Forward,
    /// Write the last field as a color/grayscale PNG pair.
    Save { palette: Palette, dir: PathBuf },
}

impl RenderRequest {
    pub(crate) fn renders(&self) -> bool {
        !matches!(self, Self::Save { .. })
    }
}

pub(crate) enum RenderResponse {
    Rendered {
        field: Arc<IterationField>,
        elapsed: Option<Duration>,
    },
    /// History had nothing in that direction.
    NoChange,
    Saved { color: PathBuf, gray: PathBuf },
    Failed(RenderError),
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Serve requests until the UI drops its sender.
///
/// Every request runs to completion (or cancellation) before the next is
/// read; the UI checks the controller state before sending, so overlapping
/// renders are refused at the source rather than queued here.
pub(crate) fn render_worker(
    ctx: egui::Context,
    controller: Arc<ViewportController>,
    rx: mpsc::Receiver<RenderRequest>,
    tx: mpsc::Sender<RenderResponse>,
) {
    while let Ok(req) = rx.recv() {
        let resp = handle(&controller, req);
        if let RenderResponse::Failed(ref e) = resp {
            warn!(error = %e, "Request failed");
        }
        if tx.send(resp).is_err() {
            return;
        }
        ctx.request_repaint();
    }
    debug!("Render worker shutting down");
}

fn handle(controller: &ViewportController, req: RenderRequest) -> RenderResponse {
    let result = match req {
        RenderRequest::Render => controller.render().map(Some),
        RenderRequest::Zoom { a, b } => controller.zoom_to(a, b).map(Some),
        RenderRequest::Reset => controller.reset().map(Some),
        RenderRequest::Back => controller.back(),
        RenderRequest::Forward => controller.forward(),
        RenderRequest::Save { palette, dir } => return save(controller, &palette, &dir),
    };
    match result {
        Ok(Some(field)) => RenderResponse::Rendered {
            field,
            elapsed: controller.last_elapsed(),
        },
        Ok(None) => RenderResponse::NoChange,
        Err(e) => RenderResponse::Failed(e),
    }
}

fn save(
    controller: &ViewportController,
    palette: &Palette,
    dir: &std::path::Path,
) -> RenderResponse {
    let Some(field) = controller.last_field() else {
        return RenderResponse::Failed(RenderError::Export("nothing rendered yet".into()));
    };
    let metadata = ExportMetadata {
        viewport: field.viewport,
        max_iterations: field.max_iterations,
        palette_name: palette.name.to_string(),
    };
    match save_pair(&field, palette, dir, &metadata) {
        Ok((color, gray)) => {
            info!(dir = %dir.display(), "Saved image pair");
            RenderResponse::Saved { color, gray }
        }
        Err(e) => RenderResponse::Failed(e),
    }
}
