use criterion::{criterion_group, criterion_main, Criterion};

use mandelzoom_core::{FractalParams, Mandelbrot, RasterDimensions, Viewport};
use mandelzoom_render::{Palette, RenderCancel, Renderer, TileGrid};

fn bench_default_view(c: &mut Criterion) {
    let renderer = Renderer::new(0).unwrap();
    let kernel = Mandelbrot::default();
    let raster = RasterDimensions::new(800, 800).unwrap();
    let cancel = RenderCancel::new();

    c.bench_function("default_view_800x800", |b| {
        b.iter(|| renderer.render(&kernel, Viewport::DEFAULT, raster, TileGrid::DEFAULT, &cancel));
    });
}

fn bench_grid_granularity(c: &mut Criterion) {
    let renderer = Renderer::new(0).unwrap();
    let kernel = Mandelbrot::new(FractalParams::new(1000).unwrap());
    let viewport = Viewport::new(-0.75, -0.73, 0.1, 0.12).unwrap();
    let raster = RasterDimensions::new(400, 400).unwrap();
    let cancel = RenderCancel::new();

    for (rows, cols) in [(1, 1), (5, 5), (16, 16)] {
        let grid = TileGrid::new(rows, cols).unwrap();
        c.bench_function(&format!("zoomed_400x400_grid_{rows}x{cols}"), |b| {
            b.iter(|| renderer.render(&kernel, viewport, raster, grid, &cancel));
        });
    }
}

fn bench_colorize(c: &mut Criterion) {
    let renderer = Renderer::new(0).unwrap();
    let raster = RasterDimensions::new(800, 800).unwrap();
    let outcome = renderer
        .render(
            &Mandelbrot::default(),
            Viewport::DEFAULT,
            raster,
            TileGrid::DEFAULT,
            &RenderCancel::new(),
        )
        .unwrap();
    let palette = Palette::default();

    c.bench_function("colorize_800x800", |b| {
        b.iter(|| palette.colorize(&outcome.field));
    });
}

criterion_group!(
    benches,
    bench_default_view,
    bench_grid_granularity,
    bench_colorize
);
criterion_main!(benches);
