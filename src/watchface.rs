//! One watch face instance: every engine plus the background work it owns.
//!
//! The face is created once per renderer. `draw_frame` reads the latest
//! published state and composes a frame; `shutdown` stops every schedule,
//! in-flight fetch and overlay timer in one step.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::info;

use crate::compositor::{render, DrawMode, DrawOp, FrameInput, Layers};
use crate::gesture::{GestureConfig, MotionSample, OverlayController, OverlayFlag};
use crate::geometry::{DirtyFlag, DrawBounds, GeometryCache};
use crate::menu::{MenuService, SharedMenuCache};
use crate::redraw::RedrawSignal;
use crate::source::MenuSource;
use crate::style::{ComplicationSlot, Configuration, StyleRepository, StyleStateManager};

pub struct WatchFace<S> {
    style: Arc<StyleStateManager>,
    geometry: GeometryCache,
    overlay: OverlayController,
    menu: Arc<MenuService<S>>,
    cache: SharedMenuCache,
    redraw: RedrawSignal,
    tasks: JoinSet<()>,
    labels: Vec<String>,
    layers: Layers,
}

impl<S: MenuSource + 'static> WatchFace<S> {
    /// The menu service's redraw signal becomes the face's.
    pub fn new(
        menu: MenuService<S>,
        initial: Configuration,
        slots: Vec<Box<dyn ComplicationSlot>>,
        gesture: GestureConfig,
        labels: Vec<String>,
        runtime: Handle,
    ) -> Self {
        let redraw = menu.redraw_signal();
        let dirty = DirtyFlag::new();
        let style = Arc::new(StyleStateManager::new(initial, slots, dirty.clone(), redraw.clone()));
        let cache = menu.cache();
        Self {
            style,
            geometry: GeometryCache::new(dirty),
            overlay: OverlayController::new(gesture, redraw.clone(), runtime),
            menu: Arc::new(menu),
            cache,
            redraw,
            tasks: JoinSet::new(),
            labels,
            layers: Layers::default(),
        }
    }

    pub fn style_manager(&self) -> Arc<StyleStateManager> {
        self.style.clone()
    }

    // Make this face's style manager the repository's consumer
    pub fn subscribe_to(&self, repository: &StyleRepository) {
        let style = self.style.clone();
        repository.subscribe(move |batch| {
            style.apply_batch(batch);
        });
    }

    pub fn redraw(&self) -> RedrawSignal {
        self.redraw.clone()
    }

    pub fn overlay(&self) -> OverlayFlag {
        self.overlay.flag()
    }

    pub fn menu_cache(&self) -> SharedMenuCache {
        self.cache.clone()
    }

    pub fn geometry_recomputes(&self) -> u64 {
        self.geometry.recomputes()
    }

    pub fn set_layers(&mut self, layers: Layers) {
        self.layers = layers;
    }

    // Restore from the store, then spawn the startup fetch and the schedules.
    pub fn start(&mut self) {
        self.menu.start(&mut self.tasks);
        info!(tasks = self.tasks.len(), hours = ?self.menu.schedule_hours(), "watch face started");
    }

    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn on_motion(&mut self, sample: MotionSample) -> bool {
        self.overlay.on_sample(sample)
    }

    /// Compose one frame from the latest published state. Consumes any
    /// pending redraw request.
    pub fn draw_frame(&mut self, now: NaiveDateTime, bounds: DrawBounds, mode: DrawMode) -> Vec<DrawOp> {
        self.redraw.take();
        let configuration = self.style.configuration();
        let palette = self.style.palette();
        let geometry = self.geometry.compute(bounds, &configuration);
        let complications = self.style.enabled_complications();
        let menu = self.cache.load();

        render(&FrameInput {
            time: now,
            bounds,
            mode,
            layers: self.layers,
            configuration: &configuration,
            palette: &palette,
            geometry: &geometry,
            complications: &complications,
            overlay_visible: self.overlay.flag().is_visible(),
            menu: menu.as_deref(),
            labels: &self.labels,
        })
    }

    /// Abort every background task and the overlay timer, then wait for the
    /// tasks to wind down.
    pub async fn shutdown(&mut self) {
        self.tasks.abort_all();
        self.overlay.cancel();
        while self.tasks.join_next().await.is_some() {}
        info!("watch face stopped");
    }
}
