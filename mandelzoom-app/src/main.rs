mod app;
mod app_dir;
mod preferences;
mod render_bridge;

fn main() -> eframe::Result {
    app::run()
}
