//! Pan and zoom state for the displayed page image
//!
//! The controller is a small state machine (idle, dragging, pinching) over
//! an affine [`Transform`]. Every mutation goes through [`clamp`], so the
//! transform is never observable outside its bounds.

use log::warn;
use serde::Serialize;

use super::types::{Point, ReadingDirection, Size};

/// Scale and translation of the composed image inside the viewport.
///
/// `translate_x`/`translate_y` position the top-left corner of the scaled
/// content in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Transform {
    pub scale: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

/// Allowed zoom range
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleLimits {
    pub min: f32,
    pub max: f32,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            min: ScaleLimits::DEFAULT_MIN,
            max: ScaleLimits::DEFAULT_MAX,
        }
    }
}

impl ScaleLimits {
    pub const DEFAULT_MIN: f32 = 0.5;
    pub const DEFAULT_MAX: f32 = 5.0;

    /// Limits with `0 < min <= 1 <= max`, falling back to defaults for
    /// unusable input. Unit scale must stay reachable: resets land on it and
    /// taps are only recognized there.
    #[must_use]
    pub fn new(min: f32, max: f32) -> Self {
        if min.is_finite() && max.is_finite() && min > 0.0 && min <= 1.0 && 1.0 <= max {
            Self { min, max }
        } else {
            warn!("Scale limits {min}..{max} exclude 1.0, using defaults");
            Self::default()
        }
    }

    /// Clamp a scale into range, handling NaN/Inf
    #[must_use]
    pub fn clamp(&self, scale: f32) -> f32 {
        if scale.is_finite() {
            scale.clamp(self.min, self.max)
        } else {
            1.0_f32.clamp(self.min, self.max)
        }
    }
}

/// Keep `transform` inside the bounds for `content` shown in `viewport`.
///
/// Per axis: content larger than the viewport may pan until its edge meets
/// the viewport edge; smaller content is pinned to the center.
#[must_use]
pub fn clamp(transform: Transform, content: Size, viewport: Size, limits: ScaleLimits) -> Transform {
    let scale = limits.clamp(transform.scale);
    Transform {
        scale,
        translate_x: clamp_axis(transform.translate_x, content.width * scale, viewport.width),
        translate_y: clamp_axis(transform.translate_y, content.height * scale, viewport.height),
    }
}

fn clamp_axis(translate: f32, scaled: f32, viewport: f32) -> f32 {
    if scaled > viewport {
        let translate = if translate.is_finite() { translate } else { 0.0 };
        translate.clamp(viewport - scaled, 0.0)
    } else {
        (viewport - scaled) / 2.0
    }
}

/// Current gesture being tracked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    Dragging,
    Pinching,
}

/// What a released tap asks the navigation layer to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapAction {
    Next,
    Prev,
    ToggleControls,
}

/// Gesture-driven pan/zoom controller
#[derive(Clone, Debug)]
pub struct TransformController {
    transform: Transform,
    snapshot: Transform,
    mode: InteractionMode,
    viewport: Size,
    content: Size,
    limits: ScaleLimits,
    direction: ReadingDirection,
    press: Option<Point>,
    pinch_midpoint: Option<Point>,
    moved: bool,
}

impl TransformController {
    /// Travel below which a press still counts as a tap
    pub const TAP_SLOP: f32 = 10.0;
    /// Finger spacing needed before a two-finger press becomes a pinch
    pub const PINCH_START_DISTANCE: f32 = 10.0;
    /// Tolerance for "not zoomed"
    pub const UNZOOMED_EPSILON: f32 = 0.01;

    #[must_use]
    pub fn new(viewport: Size, content: Size, limits: ScaleLimits) -> Self {
        let mut controller = Self {
            transform: Transform::default(),
            snapshot: Transform::default(),
            mode: InteractionMode::Idle,
            viewport,
            content,
            limits,
            direction: ReadingDirection::default(),
            press: None,
            pinch_midpoint: None,
            moved: false,
        };
        controller.reset();
        controller
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ReadingDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    #[must_use]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    #[must_use]
    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    #[must_use]
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    #[must_use]
    pub fn content(&self) -> Size {
        self.content
    }

    /// Midpoint of the fingers when the current pinch started
    #[must_use]
    pub fn pinch_midpoint(&self) -> Option<Point> {
        self.pinch_midpoint
    }

    pub fn set_direction(&mut self, direction: ReadingDirection) {
        self.direction = direction;
    }

    /// Start over at scale 1, centered, for new content. Any gesture in
    /// progress is abandoned.
    pub fn reset_for(&mut self, viewport: Size, content: Size) {
        self.viewport = viewport;
        self.content = content;
        self.reset();
    }

    fn reset(&mut self) {
        self.transform = self.clamped(Transform::default());
        self.snapshot = self.transform;
        self.mode = InteractionMode::Idle;
        self.press = None;
        self.pinch_midpoint = None;
        self.moved = false;
    }

    /// First finger down
    pub fn on_gesture_start(&mut self, point: Point) {
        self.snapshot = self.transform;
        self.mode = InteractionMode::Dragging;
        self.press = Some(point);
        self.pinch_midpoint = None;
        self.moved = false;
    }

    /// Second finger down. Fingers too close together do not pinch, but the
    /// gesture can no longer count as a tap.
    pub fn on_pointer_down2(&mut self, first: Point, second: Point) {
        self.moved = true;
        if first.distance(second) <= Self::PINCH_START_DISTANCE {
            return;
        }
        self.snapshot = self.transform;
        self.pinch_midpoint = Some(first.midpoint(second));
        self.mode = InteractionMode::Pinching;
    }

    /// Total finger travel since the gesture started
    pub fn on_drag(&mut self, dx: f32, dy: f32) {
        if self.mode != InteractionMode::Dragging {
            return;
        }
        if dx.hypot(dy) > Self::TAP_SLOP {
            self.moved = true;
        }
        let moved = Transform {
            translate_x: self.snapshot.translate_x + dx,
            translate_y: self.snapshot.translate_y + dy,
            ..self.snapshot
        };
        self.transform = self.clamped(moved);
    }

    /// Finger spacing changed from `old_distance` to `new_distance`
    pub fn on_pinch(&mut self, new_distance: f32, old_distance: f32, focal: Point) {
        if self.mode != InteractionMode::Pinching || old_distance <= 0.0 {
            return;
        }
        let factor = new_distance / old_distance;
        if !factor.is_finite() {
            return;
        }

        let current = self.transform;
        let scale = self.limits.clamp(current.scale * factor);
        // Zoom about the focal point with the factor that survived clamping
        let applied = scale / current.scale;
        let zoomed = Transform {
            scale,
            translate_x: focal.x - (focal.x - current.translate_x) * applied,
            translate_y: focal.y - (focal.y - current.translate_y) * applied,
        };
        self.transform = self.clamped(zoomed);
    }

    /// Last finger up. Returns the tap action when the gesture was a plain
    /// tap on unzoomed content.
    pub fn on_release(&mut self) -> Option<TapAction> {
        let was_dragging = self.mode == InteractionMode::Dragging;
        let press = self.press.take();
        self.mode = InteractionMode::Idle;
        self.pinch_midpoint = None;
        self.transform = self.clamped(self.transform);

        let unzoomed = (self.transform.scale - 1.0).abs() < Self::UNZOOMED_EPSILON;
        if was_dragging && !self.moved && unzoomed {
            return press.map(|point| self.classify_tap(point));
        }
        None
    }

    /// Back to scale 1, centered
    pub fn on_double_tap(&mut self) {
        self.reset();
    }

    /// Map a tap to a page turn by horizontal thirds of the viewport
    #[must_use]
    pub fn classify_tap(&self, point: Point) -> TapAction {
        let third = self.viewport.width / 3.0;
        let (left, right) = match self.direction {
            ReadingDirection::RightToLeft => (TapAction::Next, TapAction::Prev),
            ReadingDirection::LeftToRight => (TapAction::Prev, TapAction::Next),
        };
        if point.x < third {
            left
        } else if point.x > third * 2.0 {
            right
        } else {
            TapAction::ToggleControls
        }
    }

    fn clamped(&self, transform: Transform) -> Transform {
        clamp(transform, self.content, self.viewport, self.limits)
    }
}
