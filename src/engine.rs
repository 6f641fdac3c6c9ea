//! Reader engine - the command surface a host UI drives
//!
//! Single owner of [`ViewerState`] and the pan/zoom controller. Commands are
//! applied to the state machine, then the returned effects are executed in
//! order: transform reset, plan resolution and rasterization, persistence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::progress::ReadingProgressStore;
use crate::settings::Settings;
use crate::viewer::{
    Command, Effect, Notification, Point, Rasterizer, RenderPlan, RenderService, Size, SlotEvent,
    SlotStatus, TapAction, Transform, TransformController, ViewerState, resolve,
};

/// Everything a host needs to draw after a command
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub state: ViewerState,
    pub plan: RenderPlan,
    pub transform: Transform,
    pub page_label: String,
    pub controls_visible: bool,
    /// Changes whenever the composed image would look different: a new plan
    /// or a night mode switch. Hosts redraw when it moves.
    pub image_revision: u64,
}

pub struct ReaderEngine {
    document_id: String,
    state: ViewerState,
    viewport: Size,
    page_sizes: Vec<Option<Size>>,
    plan: RenderPlan,
    controller: TransformController,
    renderer: RenderService,
    store: Box<dyn ReadingProgressStore>,
    settings: Settings,
    settings_path: Option<PathBuf>,
    controls_visible: bool,
    image_revision: u64,
}

impl ReaderEngine {
    /// Open `document_id` with `page_count` pages.
    ///
    /// Saved progress is restored from `store` when present; a store failure
    /// only means the document opens at the first page.
    pub fn open(
        document_id: impl Into<String>,
        page_count: usize,
        rasterizer: Arc<dyn Rasterizer>,
        viewport: Size,
        store: Box<dyn ReadingProgressStore>,
        settings: Settings,
    ) -> Self {
        let document_id = document_id.into();

        let state = match store.load(&document_id) {
            Ok(Some(progress)) => {
                info!(
                    "Restoring {document_id} at page {} ({})",
                    progress.page_index + 1,
                    progress.display_mode.as_str()
                );
                ViewerState::restored(page_count, &progress, settings.night_mode)
            }
            Ok(None) => ViewerState::new(page_count, settings.night_mode),
            Err(e) => {
                warn!("Could not load progress for {document_id}: {e}");
                ViewerState::new(page_count, settings.night_mode)
            }
        };

        let page_sizes = (0..page_count)
            .map(|page| match rasterizer.page_size(page) {
                Ok(size) => Some(size),
                Err(e) => {
                    warn!("No size for page {page}: {e}");
                    None
                }
            })
            .collect();

        let renderer =
            RenderService::with_config(rasterizer, settings.workers, settings.cache_size);
        let controller = TransformController::new(viewport, viewport, settings.scale_limits())
            .with_direction(settings.reading_direction);

        let mut engine = Self {
            document_id,
            state,
            viewport,
            page_sizes,
            plan: RenderPlan::default(),
            controller,
            renderer,
            store,
            settings,
            settings_path: None,
            controls_visible: true,
            image_revision: 0,
        };
        engine.rerender();
        engine.reset_transform();
        engine
    }

    /// Persist preference changes (night mode) to `path`
    #[must_use]
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn next(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::Next)
    }

    pub fn prev(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::Prev)
    }

    /// `page` is 1-based
    pub fn jump_to(&mut self, page: usize) -> Result<Snapshot, Notification> {
        self.apply_command(Command::JumpTo(page))
    }

    pub fn toggle_half_page(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::ToggleHalfPage)
    }

    pub fn toggle_double_spread(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::ToggleDoubleSpread)
    }

    pub fn rotate(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::Rotate)
    }

    pub fn toggle_night_mode(&mut self) -> Result<Snapshot, Notification> {
        self.apply_command(Command::ToggleNightMode)
    }

    pub fn toggle_controls(&mut self) -> Snapshot {
        self.controls_visible = !self.controls_visible;
        self.snapshot()
    }

    /// Display surface resized or reoriented
    pub fn set_viewport(&mut self, viewport: Size) -> Snapshot {
        if viewport != self.viewport {
            debug!(
                "Viewport {}x{} -> {}x{}",
                self.viewport.width, self.viewport.height, viewport.width, viewport.height
            );
            self.viewport = viewport;
            self.rerender();
            self.reset_transform();
        }
        self.snapshot()
    }

    /// Apply a command and execute its effects
    pub fn apply_command(&mut self, cmd: Command) -> Result<Snapshot, Notification> {
        let effects = self.state.apply(cmd).inspect_err(|notification| {
            debug!("{cmd:?} rejected: {notification}");
        })?;
        self.execute_effects(&effects);
        Ok(self.snapshot())
    }

    fn execute_effects(&mut self, effects: &[Effect]) {
        // The plan must exist before the transform can be fitted to it
        if effects.contains(&Effect::Rerender) {
            self.rerender();
        }
        for effect in effects {
            match effect {
                Effect::ResetTransform => self.reset_transform(),
                Effect::Rerender => {}
                Effect::Recolor => {
                    debug!("Night mode {}", self.state.night_mode());
                    self.image_revision += 1;
                }
                Effect::SaveProgress => self.save_progress(),
                Effect::SavePreferences => self.save_preferences(),
            }
        }
    }

    fn rerender(&mut self) {
        let page_sizes = &self.page_sizes;
        let known_size = |page: usize| page_sizes.get(page).copied().flatten();
        self.plan = resolve(&self.state, self.viewport, known_size);
        self.renderer.submit(&self.plan, known_size);
        self.image_revision += 1;
    }

    fn reset_transform(&mut self) {
        let content = self.plan.display_size().unwrap_or(self.viewport);
        self.controller.reset_for(self.viewport, content);
    }

    fn save_progress(&mut self) {
        let progress = self.state.progress();
        if let Err(e) = self.store.save(&self.document_id, &progress) {
            error!("Failed to save progress for {}: {e}", self.document_id);
        }
    }

    fn save_preferences(&mut self) {
        self.settings.night_mode = self.state.night_mode();
        if let Some(path) = &self.settings_path {
            self.settings.save_to_path(path);
        }
    }

    /// First finger down
    pub fn on_gesture_start(&mut self, point: Point) -> Snapshot {
        self.controller.on_gesture_start(point);
        self.snapshot()
    }

    /// Second finger down
    pub fn on_pointer_down2(&mut self, first: Point, second: Point) -> Snapshot {
        self.controller.on_pointer_down2(first, second);
        self.snapshot()
    }

    pub fn on_drag(&mut self, dx: f32, dy: f32) -> Snapshot {
        self.controller.on_drag(dx, dy);
        self.snapshot()
    }

    pub fn on_pinch(&mut self, new_distance: f32, old_distance: f32, focal: Point) -> Snapshot {
        self.controller.on_pinch(new_distance, old_distance, focal);
        self.snapshot()
    }

    pub fn on_double_tap(&mut self) -> Snapshot {
        self.controller.on_double_tap();
        self.snapshot()
    }

    /// Last finger up. A plain tap turns the page or toggles the controls.
    pub fn on_release(&mut self) -> Result<Snapshot, Notification> {
        match self.controller.on_release() {
            Some(TapAction::Next) => self.next(),
            Some(TapAction::Prev) => self.prev(),
            Some(TapAction::ToggleControls) => Ok(self.toggle_controls()),
            None => Ok(self.snapshot()),
        }
    }

    /// Collect finished rasters for the current plan
    pub fn poll_render(&mut self) -> Vec<SlotEvent> {
        self.renderer.poll()
    }

    /// Block until the current plan is rasterized or `timeout` passes
    pub fn wait_render(&mut self, timeout: Duration) -> bool {
        self.renderer.wait(timeout)
    }

    #[must_use]
    pub fn slots(&self) -> &[SlotStatus] {
        self.renderer.slots()
    }

    /// Composed page image for the current plan, if it has any slots
    #[must_use]
    pub fn composite(&self) -> Option<RgbaImage> {
        self.renderer.composite(self.state.night_mode())
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            plan: self.plan.clone(),
            transform: self.controller.transform(),
            page_label: self.state.page_label(),
            controls_visible: self.controls_visible,
            image_revision: self.image_revision,
        }
    }

    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    #[must_use]
    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.controller.transform()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{
        JsonProgressStore, MemoryProgressStore, PersistenceError, ReadingProgress,
    };
    use crate::test_utils::test_helpers::FakeRasterizer;
    use crate::viewer::{DisplayMode, HalfSide, ReadingDirection, Rotation};

    const VIEWPORT: Size = Size::new(900.0, 1200.0);

    fn engine(page_count: usize) -> ReaderEngine {
        engine_with(page_count, MemoryProgressStore::new())
    }

    fn engine_with(page_count: usize, store: impl ReadingProgressStore + 'static) -> ReaderEngine {
        ReaderEngine::open(
            "doc.pdf",
            page_count,
            Arc::new(FakeRasterizer::new(page_count)),
            VIEWPORT,
            Box::new(store),
            Settings::default(),
        )
    }

    struct BrokenStore;

    impl ReadingProgressStore for BrokenStore {
        fn load(&self, _: &str) -> Result<Option<ReadingProgress>, PersistenceError> {
            Err(std::io::Error::other("unreachable").into())
        }

        fn save(&mut self, _: &str, _: &ReadingProgress) -> Result<(), PersistenceError> {
            Err(std::io::Error::other("unreachable").into())
        }
    }

    #[test]
    fn opens_at_first_page() {
        let engine = engine(5);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.page_label, "1/5");
        assert_eq!(snapshot.plan.pages().collect::<Vec<_>>(), vec![0]);
        assert!(snapshot.controls_visible);
    }

    #[test]
    fn restores_saved_progress() {
        let mut store = MemoryProgressStore::new();
        store
            .save(
                "doc.pdf",
                &ReadingProgress {
                    page_index: 3,
                    display_mode: DisplayMode::DoubleSpread,
                    rotation: Rotation::Deg90,
                },
            )
            .unwrap();

        let engine = engine_with(10, store);
        assert_eq!(engine.state().current_page(), 2);
        assert_eq!(engine.state().rotation(), Rotation::Deg90);
        assert_eq!(engine.plan().pages().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn store_failures_are_not_fatal() {
        let mut engine = engine_with(3, BrokenStore);
        assert_eq!(engine.state().current_page(), 0);
        let snapshot = engine.next().unwrap();
        assert_eq!(snapshot.state.current_page(), 1);
    }

    #[test]
    fn jump_shows_requested_page() {
        let mut engine = engine(8);
        let snapshot = engine.jump_to(6).unwrap();
        assert!(snapshot.plan.pages().any(|page| page == 5));
        assert_eq!(snapshot.page_label, "6/8");
    }

    #[test]
    fn rejected_command_leaves_snapshot_unchanged() {
        let mut engine = engine(3);
        let before = engine.snapshot();
        assert_eq!(
            engine.jump_to(4),
            Err(Notification::InvalidJumpTarget {
                target: 4,
                page_count: 3
            })
        );
        assert_eq!(engine.prev(), Err(Notification::AtFirstPage));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn navigation_resets_zoom() {
        let mut engine = engine(3);
        engine.on_pointer_down2(Point::new(100.0, 100.0), Point::new(300.0, 300.0));
        let zoomed = engine.on_pinch(400.0, 200.0, Point::new(200.0, 200.0));
        assert!(zoomed.transform.scale > 1.5);
        assert_eq!(zoomed.transform, engine.transform());
        assert_eq!(zoomed.state, *engine.state());

        let released = engine.on_release().unwrap();
        assert_eq!(released.transform, zoomed.transform);

        let snapshot = engine.next().unwrap();
        assert_eq!(snapshot.transform.scale, 1.0);
    }

    #[test]
    fn taps_turn_pages_right_to_left() {
        let mut engine = engine(3);

        engine.on_gesture_start(Point::new(50.0, 600.0));
        let snapshot = engine.on_release().unwrap();
        assert_eq!(snapshot.state.current_page(), 1);

        engine.on_gesture_start(Point::new(850.0, 600.0));
        let snapshot = engine.on_release().unwrap();
        assert_eq!(snapshot.state.current_page(), 0);

        engine.on_gesture_start(Point::new(450.0, 600.0));
        let snapshot = engine.on_release().unwrap();
        assert!(!snapshot.controls_visible);
    }

    #[test]
    fn left_to_right_setting_swaps_tap_zones() {
        let mut engine = ReaderEngine::open(
            "doc.pdf",
            3,
            Arc::new(FakeRasterizer::new(3)),
            VIEWPORT,
            Box::new(MemoryProgressStore::new()),
            Settings {
                reading_direction: ReadingDirection::LeftToRight,
                ..Settings::default()
            },
        );

        engine.on_gesture_start(Point::new(850.0, 600.0));
        assert_eq!(engine.on_release().unwrap().state.current_page(), 1);
    }

    #[test]
    fn taps_still_turn_pages_with_min_scale_above_one() {
        let mut engine = ReaderEngine::open(
            "doc.pdf",
            3,
            Arc::new(FakeRasterizer::new(3)),
            VIEWPORT,
            Box::new(MemoryProgressStore::new()),
            Settings {
                min_scale: 1.5,
                max_scale: 4.0,
                ..Settings::default()
            },
        );
        assert_eq!(engine.transform().scale, 1.0);

        engine.on_gesture_start(Point::new(50.0, 600.0));
        assert_eq!(engine.on_release().unwrap().state.current_page(), 1);
    }

    #[test]
    fn tap_at_last_page_notifies() {
        let mut engine = engine(1);
        engine.on_gesture_start(Point::new(50.0, 600.0));
        assert_eq!(engine.on_release(), Err(Notification::AtLastPage));
    }

    #[test]
    fn night_mode_updates_preferences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut engine = engine(2).with_settings_path(&path);

        let snapshot = engine.toggle_night_mode().unwrap();
        assert!(snapshot.state.night_mode());
        assert!(engine.settings().night_mode);
        assert!(Settings::load_from_path(&path).night_mode);
    }

    #[test]
    fn half_page_progress_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut engine = engine_with(4, JsonProgressStore::with_file(&path));
        engine.toggle_half_page().unwrap();
        engine.next().unwrap();

        let half_left = DisplayMode::HalfPage {
            side: HalfSide::Left,
        };
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state.display_mode(), half_left);
        assert_eq!(snapshot.page_label, "1/4 (L)");

        let saved = JsonProgressStore::load_from_file(&path).unwrap();
        assert_eq!(
            saved.load("doc.pdf").unwrap(),
            Some(ReadingProgress {
                page_index: 0,
                display_mode: half_left,
                rotation: Rotation::Deg0,
            })
        );

        let reopened = engine_with(4, saved);
        assert_eq!(reopened.snapshot().page_label, "1/4 (L)");
    }

    #[test]
    fn night_mode_bumps_image_revision() {
        let mut engine = engine(1);
        assert!(engine.wait_render(Duration::from_secs(5)));
        let day = engine.composite().unwrap();
        let before = engine.snapshot();

        let after = engine.toggle_night_mode().unwrap();
        assert!(after.image_revision > before.image_revision);
        assert_eq!(after.plan, before.plan);

        let night = engine.composite().unwrap();
        let source = day.get_pixel(0, 0);
        assert_eq!(
            night.get_pixel(0, 0),
            &image::Rgba([255 - source[0], 255 - source[1], 255 - source[2], source[3]])
        );
    }

    #[test]
    fn gestures_leave_image_revision_alone() {
        let mut engine = engine(2);
        let before = engine.snapshot().image_revision;
        engine.on_gesture_start(Point::new(450.0, 600.0));
        let dragged = engine.on_drag(30.0, 0.0);
        assert_eq!(dragged.image_revision, before);
        assert_eq!(engine.next().unwrap().image_revision, before + 1);
    }

    #[test]
    fn page_sizes_are_read_once_at_open() {
        let rasterizer = Arc::new(FakeRasterizer::new(4));
        let mut engine = ReaderEngine::open(
            "doc.pdf",
            4,
            rasterizer.clone(),
            VIEWPORT,
            Box::new(MemoryProgressStore::new()),
            Settings::default(),
        );
        assert_eq!(rasterizer.size_queries(), 4);

        engine.next().unwrap();
        engine.toggle_double_spread().unwrap();
        engine.rotate().unwrap();
        engine.set_viewport(Size::new(450.0, 600.0));
        assert!(engine.wait_render(Duration::from_secs(5)));
        assert_eq!(rasterizer.size_queries(), 4);
    }

    #[test]
    fn viewport_change_refits_plan() {
        let mut engine = engine(2);
        let before = engine.plan().scale;
        let snapshot = engine.set_viewport(Size::new(450.0, 600.0));
        assert!((snapshot.plan.scale - before / 2.0).abs() < 1e-3);
    }

    #[test]
    fn composite_is_available_after_render() {
        let mut engine = engine(2);
        assert!(engine.wait_render(Duration::from_secs(5)));
        let image = engine.composite().unwrap();
        let bounds = engine.plan().content_bounds().unwrap();
        assert_eq!(image.dimensions(), bounds.size().to_pixels());
    }
}
