use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use mandelzoom_core::{CoordinateMapper, EscapeKernel, Mandelbrot, RasterDimensions, Viewport};

use crate::error::RenderError;
use crate::field::IterationField;
use crate::renderer::{RenderCancel, Renderer};
use crate::tile::TileGrid;

/// Maximum number of viewports kept for back/forward navigation.
pub const MAX_HISTORY: usize = 200;

/// Whether a render is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Rendering,
}

struct Inner {
    state: ControllerState,
    viewport: Viewport,
    history: Vec<Viewport>,
    history_pos: usize,
    last_field: Option<Arc<IterationField>>,
    last_elapsed: Option<Duration>,
    /// Cancel generation captured by [`ViewportController::arm`].
    armed: Option<u64>,
}

impl Inner {
    fn push_history(&mut self, viewport: Viewport) {
        self.history.truncate(self.history_pos + 1);
        self.history.push(viewport);
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }
        self.history_pos = self.history.len() - 1;
    }

    fn ensure_idle(&self) -> crate::Result<()> {
        if self.state == ControllerState::Rendering {
            warn!("Request rejected: a render is in flight");
            return Err(RenderError::ConcurrentRenderRejected);
        }
        Ok(())
    }
}

/// How a successful render updates the viewport history.
#[derive(Debug, Clone, Copy)]
enum Commit {
    /// Re-render of the current viewport; history untouched.
    Refresh,
    /// New viewport; becomes the newest history entry.
    Push,
    /// Move the history cursor to this index.
    Seek(usize),
}

/// A render slot taken under the lock, with everything needed to finish it.
struct Claim {
    viewport: Viewport,
    commit: Commit,
    generation: u64,
}

/// Returns the controller to `Idle` when a render ends, however it ends.
struct IdleOnDrop<'a>(&'a Mutex<Inner>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).state = ControllerState::Idle;
    }
}

/// Owns the active viewport and drives renders of it.
///
/// All methods take `&self`, so one controller can be shared between a UI
/// thread and a render worker. At most one render is in flight: a second
/// `render()` (or any viewport change) while one is running fails with
/// [`RenderError::ConcurrentRenderRejected`] instead of queueing.
///
/// Navigation (`zoom_to`, `reset`, `back`, `forward`) renders the target
/// viewport first and commits the viewport, its history entry and the new
/// field together only when the render succeeds. A failed or cancelled
/// render leaves all three as they were, so [`viewport`](Self::viewport)
/// always describes [`last_field`](Self::last_field) once something has
/// been rendered.
pub struct ViewportController<K: EscapeKernel = Mandelbrot> {
    kernel: K,
    renderer: Arc<Renderer>,
    raster: RasterDimensions,
    grid: TileGrid,
    default_viewport: Viewport,
    cancel: Arc<RenderCancel>,
    inner: Mutex<Inner>,
}

impl<K: EscapeKernel> ViewportController<K> {
    /// Create a controller showing `default_viewport`.
    ///
    /// Fails with `InvalidRaster` up front if the raster cannot hold the grid.
    pub fn new(
        kernel: K,
        renderer: Arc<Renderer>,
        default_viewport: Viewport,
        raster: RasterDimensions,
        grid: TileGrid,
    ) -> crate::Result<Self> {
        if raster.width() < grid.cols || raster.height() < grid.rows {
            return Err(RenderError::InvalidRaster {
                width: raster.width(),
                height: raster.height(),
                rows: grid.rows,
                cols: grid.cols,
            });
        }
        Ok(Self {
            kernel,
            renderer,
            raster,
            grid,
            default_viewport,
            cancel: Arc::new(RenderCancel::new()),
            inner: Mutex::new(Inner {
                state: ControllerState::Idle,
                viewport: default_viewport,
                history: vec![default_viewport],
                history_pos: 0,
                last_field: None,
                last_elapsed: None,
                armed: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    pub fn default_viewport(&self) -> Viewport {
        self.default_viewport
    }

    pub fn raster(&self) -> RasterDimensions {
        self.raster
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    pub fn state(&self) -> ControllerState {
        self.lock().state
    }

    /// Pixel ↔ complex mapping for the current viewport.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.viewport(), self.raster)
    }

    /// The most recent successfully rendered field, if any.
    pub fn last_field(&self) -> Option<Arc<IterationField>> {
        self.lock().last_field.clone()
    }

    pub fn last_elapsed(&self) -> Option<Duration> {
        self.lock().last_elapsed
    }

    /// Token for cancelling the in-flight render from another thread.
    pub fn cancel_handle(&self) -> Arc<RenderCancel> {
        Arc::clone(&self.cancel)
    }

    /// Snapshot the cancel generation for the next render request.
    ///
    /// Call when a request is queued for another thread: a cancel issued
    /// after this point aborts that request even if it fires before the
    /// render starts. Without it, a render only honors cancels issued after
    /// it begins.
    pub fn arm(&self) {
        self.lock().armed = Some(self.cancel.generation());
    }

    pub fn can_go_back(&self) -> bool {
        self.lock().history_pos > 0
    }

    pub fn can_go_forward(&self) -> bool {
        let inner = self.lock();
        inner.history_pos + 1 < inner.history.len()
    }

    /// Replace the current viewport without rendering. Only legal while idle.
    pub fn set_viewport(&self, viewport: Viewport) -> crate::Result<()> {
        let mut inner = self.lock();
        inner.ensure_idle()?;
        debug!(%viewport, "Viewport set");
        inner.viewport = viewport;
        inner.push_history(viewport);
        Ok(())
    }

    /// Render the current viewport, blocking until the field is complete.
    pub fn render(&self) -> crate::Result<Arc<IterationField>> {
        let claim = self.claim(|inner| Ok((inner.viewport, Commit::Refresh)))?;
        self.run(claim)
    }

    /// Zoom into the pixel rectangle spanned by two opposite corners.
    ///
    /// The corners may come in any order and are mapped through the current
    /// viewport in the same critical section that claims the render. A
    /// selection that collapses to zero width or height is rejected with
    /// `InvalidViewport` and leaves the controller untouched.
    pub fn zoom_to(
        &self,
        corner_a: (f64, f64),
        corner_b: (f64, f64),
    ) -> crate::Result<Arc<IterationField>> {
        let claim = self.claim(|inner| {
            let mapper = CoordinateMapper::new(inner.viewport, self.raster);
            let a = mapper.pixel_to_complex(corner_a.0, corner_a.1);
            let b = mapper.pixel_to_complex(corner_b.0, corner_b.1);
            let next = Viewport::from_corners(a, b)?;
            info!(from = %inner.viewport, to = %next, "Zooming to selection");
            Ok((next, Commit::Push))
        })?;
        self.run(claim)
    }

    /// Render the startup viewport and make it current.
    pub fn reset(&self) -> crate::Result<Arc<IterationField>> {
        info!("Resetting viewport");
        let claim = self.claim(|_| Ok((self.default_viewport, Commit::Push)))?;
        self.run(claim)
    }

    /// Step back to the previous viewport, if any, and re-render.
    pub fn back(&self) -> crate::Result<Option<Arc<IterationField>>> {
        self.step_history(-1)
    }

    /// Step forward again after [`back`](Self::back), if possible.
    pub fn forward(&self) -> crate::Result<Option<Arc<IterationField>>> {
        self.step_history(1)
    }

    fn step_history(&self, delta: isize) -> crate::Result<Option<Arc<IterationField>>> {
        let claim = {
            let mut inner = self.lock();
            let armed = inner.armed.take();
            inner.ensure_idle()?;
            let target = inner.history_pos as isize + delta;
            if target < 0 || target as usize >= inner.history.len() {
                return Ok(None);
            }
            let target = target as usize;
            inner.state = ControllerState::Rendering;
            Claim {
                viewport: inner.history[target],
                commit: Commit::Seek(target),
                generation: armed.unwrap_or_else(|| self.cancel.generation()),
            }
        };
        self.run(claim).map(Some)
    }

    /// Take the render slot, choosing the target viewport under the same lock.
    ///
    /// `choose` runs only when idle; if it fails, nothing changes.
    fn claim(
        &self,
        choose: impl FnOnce(&Inner) -> crate::Result<(Viewport, Commit)>,
    ) -> crate::Result<Claim> {
        let mut inner = self.lock();
        let armed = inner.armed.take();
        inner.ensure_idle()?;
        let (viewport, commit) = choose(&*inner)?;
        inner.state = ControllerState::Rendering;
        Ok(Claim {
            viewport,
            commit,
            generation: armed.unwrap_or_else(|| self.cancel.generation()),
        })
    }

    /// Render a claimed viewport and commit it on success.
    fn run(&self, claim: Claim) -> crate::Result<Arc<IterationField>> {
        let _idle = IdleOnDrop(&self.inner);

        let outcome = match self.renderer.render_from(
            &self.kernel,
            claim.viewport,
            self.raster,
            self.grid,
            &self.cancel,
            claim.generation,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Render failed; keeping previous view");
                return Err(e);
            }
        };

        let field = Arc::new(outcome.field);
        let mut inner = self.lock();
        match claim.commit {
            Commit::Refresh => {}
            Commit::Push => inner.push_history(claim.viewport),
            Commit::Seek(pos) => inner.history_pos = pos,
        }
        inner.viewport = claim.viewport;
        inner.last_field = Some(Arc::clone(&field));
        inner.last_elapsed = Some(outcome.elapsed);
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use mandelzoom_core::{Complex, FractalParams};

    fn controller(w: u32, h: u32) -> ViewportController {
        ViewportController::new(
            Mandelbrot::new(FractalParams::new(64).unwrap()),
            Arc::new(Renderer::new(2).unwrap()),
            Viewport::DEFAULT,
            RasterDimensions::new(w, h).unwrap(),
            TileGrid::DEFAULT,
        )
        .unwrap()
    }

    /// Blocks inside the first pixel until released, so a render can be held
    /// in flight.
    #[derive(Default)]
    struct GateKernel {
        entered: AtomicBool,
        released: AtomicBool,
        fail: AtomicBool,
    }

    impl EscapeKernel for GateKernel {
        fn escape_time(&self, _c: Complex) -> u32 {
            self.entered.store(true, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            if self.fail.load(Ordering::SeqCst) {
                u32::MAX
            } else {
                1
            }
        }

        fn max_iterations(&self) -> u32 {
            1
        }
    }

    fn gated(threads: usize, grid: TileGrid) -> Arc<ViewportController<GateKernel>> {
        Arc::new(
            ViewportController::new(
                GateKernel::default(),
                Arc::new(Renderer::new(threads).unwrap()),
                Viewport::DEFAULT,
                RasterDimensions::new(10, 10).unwrap(),
                grid,
            )
            .unwrap(),
        )
    }

    fn wait_until_entered(ctl: &ViewportController<GateKernel>) {
        while !ctl.kernel().entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }
    }

    #[test]
    fn rejects_raster_smaller_than_grid() {
        let result = ViewportController::new(
            Mandelbrot::default(),
            Arc::new(Renderer::new(1).unwrap()),
            Viewport::DEFAULT,
            RasterDimensions::new(3, 3).unwrap(),
            TileGrid::DEFAULT,
        );
        assert!(matches!(result, Err(RenderError::InvalidRaster { .. })));
    }

    #[test]
    fn render_stores_last_field() {
        let ctl = controller(40, 40);
        assert!(ctl.last_field().is_none());
        let field = ctl.render().unwrap();
        assert!(Arc::ptr_eq(&field, &ctl.last_field().unwrap()));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(ctl.last_elapsed().is_some());
    }

    #[test]
    fn zoom_is_order_independent() {
        let a = controller(100, 100);
        let b = controller(100, 100);
        a.zoom_to((20.0, 70.0), (60.0, 30.0)).unwrap();
        b.zoom_to((60.0, 30.0), (20.0, 70.0)).unwrap();
        assert_eq!(a.viewport(), b.viewport());

        let c = controller(100, 100);
        c.zoom_to((20.0, 30.0), (60.0, 70.0)).unwrap();
        assert_eq!(a.viewport(), c.viewport());
    }

    #[test]
    fn zoom_maps_selection_through_current_viewport() {
        let ctl = controller(300, 300);
        // 100 px = 1.0 in both axes on the default view.
        ctl.zoom_to((100.0, 100.0), (200.0, 250.0)).unwrap();
        let vp = ctl.viewport();
        assert!((vp.xmin() - (-1.0)).abs() < 1e-12);
        assert!((vp.xmax() - 0.0).abs() < 1e-12);
        assert!((vp.ymax() - 0.5).abs() < 1e-12);
        assert!((vp.ymin() - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_selection_leaves_state_untouched() {
        let ctl = controller(50, 50);
        let before = ctl.render().unwrap();
        let err = ctl.zoom_to((10.0, 5.0), (10.0, 40.0)).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Core(mandelzoom_core::CoreError::InvalidViewport { .. })
        ));
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
        assert!(Arc::ptr_eq(&before, &ctl.last_field().unwrap()));
        assert!(!ctl.can_go_back());
    }

    #[test]
    fn reset_restores_default() {
        let ctl = controller(50, 50);
        ctl.zoom_to((0.0, 0.0), (25.0, 25.0)).unwrap();
        assert_ne!(ctl.viewport(), Viewport::DEFAULT);
        let field = ctl.reset().unwrap();
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
        assert_eq!(field.width, 50);
    }

    #[test]
    fn history_back_and_forward() {
        let ctl = controller(50, 50);
        ctl.zoom_to((0.0, 0.0), (25.0, 25.0)).unwrap();
        let zoomed = ctl.viewport();

        assert!(ctl.back().unwrap().is_some());
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
        assert!(ctl.back().unwrap().is_none());

        assert!(ctl.forward().unwrap().is_some());
        assert_eq!(ctl.viewport(), zoomed);
        assert!(ctl.forward().unwrap().is_none());
    }

    #[test]
    fn history_is_bounded() {
        let ctl = controller(10, 10);
        for i in 0..(MAX_HISTORY + 20) {
            let x = i as f64;
            ctl.set_viewport(Viewport::new(x, x + 1.0, 0.0, 1.0).unwrap())
                .unwrap();
        }
        assert_eq!(ctl.lock().history.len(), MAX_HISTORY);
        assert_eq!(ctl.lock().history_pos, MAX_HISTORY - 1);
    }

    #[test]
    fn concurrent_render_rejected() {
        let ctl = gated(1, TileGrid::new(1, 1).unwrap());
        let worker = {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.render())
        };
        wait_until_entered(&ctl);

        assert_eq!(ctl.state(), ControllerState::Rendering);
        assert!(matches!(ctl.render(), Err(RenderError::ConcurrentRenderRejected)));
        assert!(matches!(
            ctl.set_viewport(Viewport::new(0.0, 1.0, 0.0, 1.0).unwrap()),
            Err(RenderError::ConcurrentRenderRejected)
        ));
        assert!(matches!(ctl.reset(), Err(RenderError::ConcurrentRenderRejected)));

        ctl.kernel().released.store(true, Ordering::SeqCst);
        let field = worker.join().unwrap().unwrap();
        assert!(field.data.iter().all(|&n| n == 1));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
    }

    #[test]
    fn failed_render_keeps_previous_field() {
        let ctl = gated(2, TileGrid::DEFAULT);
        ctl.kernel().released.store(true, Ordering::SeqCst);
        let good = ctl.render().unwrap();

        ctl.kernel().fail.store(true, Ordering::SeqCst);
        let err = ctl.render().unwrap_err();
        assert!(matches!(err, RenderError::TileComputeFailure { .. }));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(Arc::ptr_eq(&good, &ctl.last_field().unwrap()));
    }

    #[test]
    fn cancelled_render_returns_no_field() {
        // One worker, several tiles: tiles after the gated one see the new generation.
        let ctl = gated(1, TileGrid::new(2, 2).unwrap());
        let worker = {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.render())
        };
        wait_until_entered(&ctl);
        ctl.cancel_handle().cancel();
        ctl.kernel().released.store(true, Ordering::SeqCst);

        let result = worker.join().unwrap();
        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert!(ctl.last_field().is_none());
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn failed_zoom_keeps_viewport_in_step_with_field() {
        let ctl = gated(2, TileGrid::DEFAULT);
        ctl.kernel().released.store(true, Ordering::SeqCst);
        let good = ctl.render().unwrap();
        assert_eq!(good.viewport, Viewport::DEFAULT);

        ctl.kernel().fail.store(true, Ordering::SeqCst);
        let err = ctl.zoom_to((0.0, 0.0), (5.0, 5.0)).unwrap_err();
        assert!(matches!(err, RenderError::TileComputeFailure { .. }));

        let shown = ctl.last_field().unwrap();
        assert!(Arc::ptr_eq(&good, &shown));
        assert_eq!(ctl.viewport(), shown.viewport);
        assert_eq!(ctl.mapper().viewport(), shown.viewport);
        assert!(!ctl.can_go_back());
        assert_eq!(ctl.lock().history, vec![Viewport::DEFAULT]);

        ctl.kernel().fail.store(false, Ordering::SeqCst);
        let zoomed = ctl.zoom_to((0.0, 0.0), (5.0, 5.0)).unwrap();
        assert_eq!(ctl.viewport(), zoomed.viewport);
        assert_eq!(zoomed.viewport, Viewport::new(-2.0, -0.5, 0.0, 1.5).unwrap());
        assert!(ctl.can_go_back());
    }

    #[test]
    fn cancelled_zoom_leaves_viewport_and_history() {
        let ctl = gated(1, TileGrid::new(2, 2).unwrap());
        let worker = {
            let ctl = Arc::clone(&ctl);
            thread::spawn(move || ctl.zoom_to((0.0, 0.0), (5.0, 5.0)))
        };
        wait_until_entered(&ctl);
        ctl.cancel_handle().cancel();
        ctl.kernel().released.store(true, Ordering::SeqCst);

        assert!(matches!(worker.join().unwrap(), Err(RenderError::Cancelled)));
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
        assert!(!ctl.can_go_back());
        assert!(ctl.last_field().is_none());
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn failed_back_keeps_history_cursor() {
        let ctl = gated(2, TileGrid::DEFAULT);
        ctl.kernel().released.store(true, Ordering::SeqCst);
        let zoomed = ctl.zoom_to((0.0, 0.0), (5.0, 5.0)).unwrap();

        ctl.kernel().fail.store(true, Ordering::SeqCst);
        assert!(ctl.back().is_err());
        assert_eq!(ctl.viewport(), zoomed.viewport);
        assert!(ctl.can_go_back());
        assert!(!ctl.can_go_forward());
    }

    #[test]
    fn cancel_between_arm_and_render_is_honored() {
        let ctl = controller(40, 40);
        let first = ctl.render().unwrap();

        ctl.arm();
        ctl.cancel_handle().cancel();
        let err = ctl.zoom_to((0.0, 0.0), (20.0, 20.0)).unwrap_err();
        assert!(matches!(err, RenderError::Cancelled));
        assert_eq!(ctl.viewport(), Viewport::DEFAULT);
        assert!(Arc::ptr_eq(&first, &ctl.last_field().unwrap()));

        // The armed snapshot is spent; the next request renders normally.
        ctl.zoom_to((0.0, 0.0), (20.0, 20.0)).unwrap();
        assert_ne!(ctl.viewport(), Viewport::DEFAULT);
    }

    #[test]
    fn unarmed_render_ignores_earlier_cancel() {
        let ctl = controller(40, 40);
        ctl.cancel_handle().cancel();
        assert!(ctl.render().is_ok());
    }
}
