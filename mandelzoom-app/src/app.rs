use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eframe::egui;
use tracing::{debug, info};

use mandelzoom_core::{Mandelbrot, RasterDimensions, Viewport};
use mandelzoom_render::{
    builtin_palettes, ControllerState, IterationField, Palette, RenderError, Renderer,
    ViewportController,
};

use crate::preferences::AppPreferences;
use crate::render_bridge::{render_worker, RenderRequest, RenderResponse};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Selections narrower or shorter than this (screen points) are treated as clicks.
const MIN_SELECTION_PX: f32 = 5.0;
const SELECTION_COLOR: egui::Color32 = egui::Color32::RED;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub(crate) struct MandelZoomApp {
    preferences: AppPreferences,
    controller: Arc<ViewportController>,
    tx_request: mpsc::Sender<RenderRequest>,
    rx_response: mpsc::Receiver<RenderResponse>,

    palette: Palette,
    field: Option<Arc<IterationField>>,
    texture: Option<egui::TextureHandle>,
    viewport: Viewport,
    render_time: Option<Duration>,

    /// A request is queued on the worker and has not answered yet.
    pending: bool,
    status: String,

    selection_start: Option<egui::Pos2>,
    selection_end: Option<egui::Pos2>,
}

impl MandelZoomApp {
    pub(crate) fn new(
        egui_ctx: &egui::Context,
        preferences: AppPreferences,
    ) -> Result<Self, RenderError> {
        let renderer = Arc::new(Renderer::new(preferences.worker_threads)?);
        let controller = Arc::new(ViewportController::new(
            Mandelbrot::new(preferences.fractal_params()),
            renderer,
            preferences.default_viewport,
            preferences.raster(),
            preferences.tile_grid(),
        )?);

        let (tx_req, rx_req) = mpsc::channel();
        let (tx_resp, rx_resp) = mpsc::channel();
        let ctx = egui_ctx.clone();
        let worker_controller = Arc::clone(&controller);
        thread::Builder::new()
            .name("render-bridge".into())
            .spawn(move || render_worker(ctx, worker_controller, rx_req, tx_resp))
            .expect("failed to spawn render worker thread");

        let mut app = Self {
            palette: preferences.palette(),
            viewport: controller.viewport(),
            preferences,
            controller,
            tx_request: tx_req,
            rx_response: rx_resp,
            field: None,
            texture: None,
            render_time: None,
            pending: false,
            status: String::new(),
            selection_start: None,
            selection_end: None,
        };
        app.submit(RenderRequest::Render);
        Ok(app)
    }

    fn raster(&self) -> RasterDimensions {
        self.controller.raster()
    }

    // -----------------------------------------------------------------------
    // Worker traffic
    // -----------------------------------------------------------------------

    /// Hand a request to the worker unless a render is already in flight.
    fn submit(&mut self, req: RenderRequest) {
        let busy = self.pending || self.controller.state() == ControllerState::Rendering;
        if busy {
            info!("Render already in progress; request ignored");
            self.status = RenderError::ConcurrentRenderRejected.to_string();
            return;
        }
        if req.renders() {
            self.controller.arm();
        }
        if self.tx_request.send(req).is_ok() {
            self.pending = true;
            self.status = "Rendering\u{2026}".into();
        }
    }

    fn poll_responses(&mut self, ctx: &egui::Context) {
        while let Ok(resp) = self.rx_response.try_recv() {
            self.pending = false;
            match resp {
                RenderResponse::Rendered { field, elapsed } => {
                    self.viewport = field.viewport;
                    self.render_time = elapsed;
                    self.field = Some(field);
                    self.upload_texture(ctx);
                    self.status = "Done".into();
                }
                RenderResponse::NoChange => {
                    self.status = "No further history".into();
                }
                RenderResponse::Saved { color, gray } => {
                    self.status = format!("Saved {} and {}", color.display(), gray.display());
                }
                RenderResponse::Failed(e) => {
                    self.status = e.to_string();
                }
            }
        }
    }

    /// Colorize the current field with the active palette and upload it.
    fn upload_texture(&mut self, ctx: &egui::Context) {
        let Some(field) = &self.field else {
            return;
        };
        let buffer = self.palette.colorize(field);
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [buffer.width as usize, buffer.height as usize],
            &buffer.pixels,
        );
        self.texture = Some(ctx.load_texture("fractal", image, egui::TextureOptions::LINEAR));
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw_controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Reset").clicked() {
                    self.submit(RenderRequest::Reset);
                }
                if ui
                    .add_enabled(self.controller.can_go_back(), egui::Button::new("Back"))
                    .clicked()
                {
                    self.submit(RenderRequest::Back);
                }
                if ui
                    .add_enabled(self.controller.can_go_forward(), egui::Button::new("Forward"))
                    .clicked()
                {
                    self.submit(RenderRequest::Forward);
                }
                if ui
                    .add_enabled(self.field.is_some(), egui::Button::new("Save"))
                    .clicked()
                {
                    let dir: PathBuf = self.preferences.export_directory();
                    self.submit(RenderRequest::Save {
                        palette: self.palette.clone(),
                        dir,
                    });
                }

                ui.separator();
                let mut changed = false;
                egui::ComboBox::from_id_salt("palette")
                    .selected_text(self.palette.name)
                    .show_ui(ui, |ui| {
                        for pal in builtin_palettes() {
                            let selected = pal.name == self.palette.name;
                            if ui.selectable_label(selected, pal.name).clicked() && !selected {
                                self.palette = pal;
                                changed = true;
                            }
                        }
                    });
                if changed {
                    debug!(palette = self.palette.name, "Palette changed");
                    self.preferences.palette = self.palette.name.to_string();
                    self.upload_texture(ctx);
                }
            });

            ui.horizontal(|ui| {
                ui.label(format!("{}", self.viewport));
                if let Some(t) = self.render_time {
                    ui.separator();
                    ui.label(format!("{:.1} ms", t.as_secs_f64() * 1000.0));
                }
                ui.separator();
                if self.pending {
                    let (done, total) = self.controller.cancel_handle().progress();
                    if total > 0 {
                        ui.add(
                            egui::ProgressBar::new(done as f32 / total as f32)
                                .desired_width(120.0)
                                .text(format!("{done}/{total} tiles")),
                        );
                    }
                }
                ui.label(&self.status);
            });
        });
    }

    fn draw_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let available = ui.available_size();
                let (response, painter) =
                    ui.allocate_painter(available, egui::Sense::click_and_drag());
                let image_rect = fit_rect(response.rect, self.raster());

                if let Some(tex) = &self.texture {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    painter.image(tex.id(), image_rect, uv, egui::Color32::WHITE);
                }

                if response.drag_started_by(egui::PointerButton::Primary) {
                    self.selection_start = response.interact_pointer_pos();
                    self.selection_end = self.selection_start;
                }
                if response.dragged_by(egui::PointerButton::Primary) {
                    if let Some(pos) = response.interact_pointer_pos() {
                        self.selection_end = Some(pos);
                    }
                }
                if response.drag_stopped_by(egui::PointerButton::Primary) {
                    self.finish_selection(image_rect);
                }

                if let (Some(a), Some(b)) = (self.selection_start, self.selection_end) {
                    painter.rect_stroke(
                        egui::Rect::from_two_pos(a, b),
                        0.0,
                        egui::Stroke::new(2.0, SELECTION_COLOR),
                        egui::StrokeKind::Outside,
                    );
                }
            });
    }

    fn finish_selection(&mut self, image_rect: egui::Rect) {
        let (Some(a), Some(b)) = (self.selection_start.take(), self.selection_end.take()) else {
            return;
        };
        let size = egui::Rect::from_two_pos(a, b).size();
        if size.x < MIN_SELECTION_PX || size.y < MIN_SELECTION_PX {
            debug!("Selection too small; ignored");
            return;
        }
        let raster = self.raster();
        self.submit(RenderRequest::Zoom {
            a: screen_to_pixel(a, image_rect, raster),
            b: screen_to_pixel(b, image_rect, raster),
        });
    }
}

/// Largest rect with the raster's aspect ratio, centred in `outer`.
fn fit_rect(outer: egui::Rect, raster: RasterDimensions) -> egui::Rect {
    let aspect = raster.width() as f32 / raster.height() as f32;
    let mut size = outer.size();
    if size.x / size.y > aspect {
        size.x = size.y * aspect;
    } else {
        size.y = size.x / aspect;
    }
    egui::Rect::from_center_size(outer.center(), size)
}

/// Screen position to raster pixel coordinates, clamped to the image.
fn screen_to_pixel(
    pos: egui::Pos2,
    image_rect: egui::Rect,
    raster: RasterDimensions,
) -> (f64, f64) {
    let pos = image_rect.clamp(pos);
    let fx = (pos.x - image_rect.min.x) / image_rect.width();
    let fy = (pos.y - image_rect.min.y) / image_rect.height();
    (
        fx as f64 * raster.width() as f64,
        fy as f64 * raster.height() as f64,
    )
}

// ---------------------------------------------------------------------------
// eframe::App
// ---------------------------------------------------------------------------

impl eframe::App for MandelZoomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());
        self.poll_responses(ctx);

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            if self.pending {
                info!("Cancelling render");
                self.controller.cancel_handle().cancel();
            }
            self.selection_start = None;
            self.selection_end = None;
        }

        self.draw_controls(ctx);
        self.draw_canvas(ctx);

        if self.pending {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.preferences.save();
        info!("Saved preferences on exit");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub(crate) fn run() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting MandelZoom");

    let prefs = AppPreferences::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("MandelZoom")
            .with_inner_size([prefs.window_width, prefs.window_height]),
        ..Default::default()
    };

    eframe::run_native(
        "MandelZoom",
        options,
        Box::new(move |cc| Ok(Box::new(MandelZoomApp::new(&cc.egui_ctx, prefs)?))),
    )
}
