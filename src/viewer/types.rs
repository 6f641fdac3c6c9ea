//! Core types for page navigation and layout

use serde::{Deserialize, Serialize};

/// Width/height pair in either content units or display pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// The same size with width and height exchanged
    #[must_use]
    pub const fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// True if both dimensions are finite and strictly positive
    #[must_use]
    pub fn is_drawable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Rounded pixel dimensions, never smaller than 1x1
    #[must_use]
    pub fn to_pixels(self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// A point in display coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned rectangle
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Smallest rectangle containing both
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

/// Which half of a page is shown in half-page mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfSide {
    Left,
    #[default]
    Right,
}

impl HalfSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            HalfSide::Left => "L",
            HalfSide::Right => "R",
        }
    }
}

/// How pages are laid out on screen.
///
/// The half-page side only exists inside `HalfPage`, so a side can never be
/// attached to a mode that ignores it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Single,
    HalfPage {
        side: HalfSide,
    },
    DoubleSpread,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Single => "Single",
            DisplayMode::HalfPage { .. } => "HalfPage",
            DisplayMode::DoubleSpread => "DoubleSpread",
        }
    }

    /// Half-page side, if this is half-page mode
    #[must_use]
    pub fn half_side(&self) -> Option<HalfSide> {
        match self {
            DisplayMode::HalfPage { side } => Some(*side),
            _ => None,
        }
    }
}

/// Clockwise rotation in quarter turns
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Normalizes any multiple of 90 into a rotation; other values are rejected
    #[must_use]
    pub const fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Rotation advanced by a quarter turn
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg270,
            Rotation::Deg270 => Rotation::Deg0,
        }
    }

    /// True for 90 and 270, where width and height trade places
    #[must_use]
    pub const fn is_sideways(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {degrees}"))
    }
}

/// Reading direction used to map tap zones to page turns
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingDirection {
    /// Left edge advances, right edge goes back
    #[default]
    RightToLeft,
    LeftToRight,
}

/// One page region to rasterize and where to place it
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSlot {
    /// Page index (0-based)
    pub page_index: usize,
    /// Region of the page in content units
    pub crop: Rect,
    /// Placement in the unrotated layout canvas, in display pixels
    pub dest: Rect,
}

impl PageSlot {
    /// Crop to hand the rasterizer, `None` when the whole page is wanted
    #[must_use]
    pub fn raster_crop(&self, page_size: Size) -> Option<Rect> {
        let full = Rect::from_size(page_size);
        if self.crop == full { None } else { Some(self.crop) }
    }

    /// Raster dimensions matching the destination rectangle
    #[must_use]
    pub fn target_pixels(&self) -> (u32, u32) {
        self.dest.size().to_pixels()
    }
}

/// Resolved description of what to rasterize and display
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Slots ordered left to right
    pub slots: Vec<PageSlot>,
    /// Uniform page scale shared by every slot
    pub scale: f32,
    /// Clockwise rotation applied to the composed image
    pub rotation: Rotation,
}

impl RenderPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Page indices covered by the plan
    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().map(|slot| slot.page_index)
    }

    /// Bounding box of all slots in the unrotated canvas
    #[must_use]
    pub fn content_bounds(&self) -> Option<Rect> {
        let mut slots = self.slots.iter();
        let first = slots.next()?.dest;
        Some(slots.fold(first, |acc, slot| acc.union(&slot.dest)))
    }

    /// Size of the composed image after rotation, as it reaches the display
    #[must_use]
    pub fn display_size(&self) -> Option<Size> {
        let size = self.content_bounds()?.size();
        Some(if self.rotation.is_sideways() {
            size.transposed()
        } else {
            size
        })
    }
}
