//! Render plan resolution
//!
//! Maps viewer state, viewport and page dimensions to the slots that need
//! rasterizing. Pure: no rasterization, no display surface.

use log::warn;

use super::navigation::ViewerState;
use super::types::{DisplayMode, HalfSide, PageSlot, Rect, RenderPlan, Size};

/// Share of the viewport a spread may fill, leaving a thin border
pub const SPREAD_FILL: f32 = 0.95;

/// Stand-in dimensions when the rasterizer cannot report a page size
pub const FALLBACK_PAGE_SIZE: Size = Size::new(595.0, 842.0);

/// Resolve the render plan for `state` shown in `viewport`.
///
/// For 90 and 270 degree rotations the layout is computed against the
/// transposed viewport; the composed image is rotated afterwards.
#[must_use]
pub fn resolve<F>(state: &ViewerState, viewport: Size, page_size: F) -> RenderPlan
where
    F: Fn(usize) -> Option<Size>,
{
    let rotation = state.rotation();
    let canvas = if rotation.is_sideways() {
        viewport.transposed()
    } else {
        viewport
    };

    let pages = state.visible_pages();
    if pages.is_empty() || !canvas.is_drawable() {
        return RenderPlan {
            slots: Vec::new(),
            scale: 1.0,
            rotation,
        };
    }

    let sized: Vec<(usize, Size)> = pages
        .into_iter()
        .map(|page| {
            let size = page_size(page)
                .filter(|size| size.is_drawable())
                .unwrap_or_else(|| {
                    warn!("No usable size for page {page}, using fallback");
                    FALLBACK_PAGE_SIZE
                });
            (page, size)
        })
        .collect();

    let (slots, scale) = match (state.display_mode(), sized.as_slice()) {
        (DisplayMode::HalfPage { side }, [(page, size), ..]) => {
            let (slot, scale) = half_page(*page, *size, side, canvas);
            (vec![slot], scale)
        }
        (DisplayMode::DoubleSpread, _) => spread(&sized, canvas),
        (_, [(page, size), ..]) => {
            let (slot, scale) = single_page(*page, *size, canvas);
            (vec![slot], scale)
        }
        (_, []) => (Vec::new(), 1.0),
    };

    RenderPlan {
        slots,
        scale,
        rotation,
    }
}

fn single_page(page: usize, size: Size, canvas: Size) -> (PageSlot, f32) {
    let scale = (canvas.width / size.width).min(canvas.height / size.height);
    let slot = PageSlot {
        page_index: page,
        crop: Rect::from_size(size),
        dest: centered(size.scaled(scale), canvas),
    };
    (slot, scale)
}

fn half_page(page: usize, size: Size, side: HalfSide, canvas: Size) -> (PageSlot, f32) {
    let half_width = size.width / 2.0;
    let scale = (canvas.width / half_width).min(canvas.height / size.height);
    let crop_x = match side {
        HalfSide::Left => 0.0,
        HalfSide::Right => half_width,
    };
    let crop = Rect::new(crop_x, 0.0, half_width, size.height);
    let slot = PageSlot {
        page_index: page,
        crop,
        dest: centered(crop.size().scaled(scale), canvas),
    };
    (slot, scale)
}

/// Lay pages edge to edge at one shared scale, centered as a block
fn spread(pages: &[(usize, Size)], canvas: Size) -> (Vec<PageSlot>, f32) {
    let max_height = pages.iter().map(|(_, s)| s.height).fold(0.0, f32::max);
    let total_width: f32 = pages.iter().map(|(_, s)| s.width).sum();
    if max_height <= 0.0 || total_width <= 0.0 {
        return (Vec::new(), 1.0);
    }

    let scale = (canvas.height * SPREAD_FILL / max_height)
        .min(canvas.width * SPREAD_FILL / total_width);

    let mut x = (canvas.width - total_width * scale) / 2.0;
    let slots = pages
        .iter()
        .map(|&(page, size)| {
            let scaled = size.scaled(scale);
            let dest = Rect::new(
                x,
                (canvas.height - scaled.height) / 2.0,
                scaled.width,
                scaled.height,
            );
            x += scaled.width;
            PageSlot {
                page_index: page,
                crop: Rect::from_size(size),
                dest,
            }
        })
        .collect();
    (slots, scale)
}

fn centered(size: Size, canvas: Size) -> Rect {
    Rect::new(
        (canvas.width - size.width) / 2.0,
        (canvas.height - size.height) / 2.0,
        size.width,
        size.height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::navigation::Command;
    use crate::viewer::types::Rotation;

    const LETTER: Size = Size::new(600.0, 800.0);

    fn letter(_: usize) -> Option<Size> {
        Some(LETTER)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn state(page_count: usize, commands: &[Command]) -> ViewerState {
        let mut state = ViewerState::new(page_count, false);
        for cmd in commands {
            state.apply(*cmd).unwrap();
        }
        state
    }

    #[test]
    fn single_page_fits_and_centers() {
        let plan = resolve(&state(3, &[]), Size::new(1200.0, 1200.0), letter);
        assert_eq!(plan.slots.len(), 1);
        assert!(approx(plan.scale, 1.5));

        let dest = plan.slots[0].dest;
        assert!(approx(dest.width, 900.0));
        assert!(approx(dest.height, 1200.0));
        assert!(approx(dest.x, 150.0));
        assert!(approx(dest.y, 0.0));
        assert_eq!(plan.slots[0].crop, Rect::from_size(LETTER));
    }

    #[test]
    fn half_page_crops_selected_side() {
        let viewport = Size::new(600.0, 1600.0);
        let right = resolve(&state(3, &[Command::ToggleHalfPage]), viewport, letter);
        // min(600 / 300, 1600 / 800) = 2
        assert!(approx(right.scale, 2.0));
        assert_eq!(right.slots[0].crop, Rect::new(300.0, 0.0, 300.0, 800.0));
        assert!(approx(right.slots[0].dest.width, 600.0));

        let left = resolve(
            &state(3, &[Command::ToggleHalfPage, Command::Next]),
            viewport,
            letter,
        );
        assert_eq!(left.slots[0].crop, Rect::new(0.0, 0.0, 300.0, 800.0));
    }

    #[test]
    fn spread_shares_scale_and_touches() {
        let sizes = |page: usize| {
            Some(if page == 0 {
                Size::new(400.0, 600.0)
            } else {
                Size::new(600.0, 500.0)
            })
        };
        let viewport = Size::new(2000.0, 1000.0);
        let plan = resolve(&state(4, &[Command::ToggleDoubleSpread]), viewport, sizes);

        // min(1000 * 0.95 / 600, 2000 * 0.95 / 1000)
        let expected = (950.0_f32 / 600.0).min(1.9);
        assert!(approx(plan.scale, expected));
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![0, 1]);

        let [left, right] = [plan.slots[0].dest, plan.slots[1].dest];
        assert!(approx(left.right(), right.x));
        let block = left.union(&right);
        assert!(approx(block.x, viewport.width - block.right()));
        assert!(approx(left.y + left.height / 2.0, viewport.height / 2.0));
        assert!(approx(right.y + right.height / 2.0, viewport.height / 2.0));
    }

    #[test]
    fn lone_spread_page_is_centered() {
        let plan = resolve(
            &state(3, &[Command::ToggleDoubleSpread, Command::Next]),
            Size::new(2000.0, 1000.0),
            letter,
        );
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![2]);
        let dest = plan.slots[0].dest;
        assert!(approx(dest.x + dest.width / 2.0, 1000.0));
    }

    #[test]
    fn sideways_rotation_transposes_viewport() {
        let viewport = Size::new(1600.0, 600.0);
        let upright = resolve(&state(1, &[]), viewport, letter);
        let rotated = resolve(&state(1, &[Command::Rotate]), viewport, letter);

        assert!(approx(upright.scale, 0.75));
        // Canvas becomes 600x1600: min(600 / 600, 1600 / 800) = 1
        assert!(approx(rotated.scale, 1.0));
        assert_eq!(rotated.rotation, Rotation::Deg90);
        let shown = rotated.display_size().unwrap();
        assert!(approx(shown.width, 800.0));
        assert!(approx(shown.height, 600.0));
    }

    #[test]
    fn unknown_page_size_uses_fallback() {
        let plan = resolve(&state(2, &[]), Size::new(595.0, 842.0), |_| None);
        assert_eq!(plan.slots[0].crop, Rect::from_size(FALLBACK_PAGE_SIZE));
        assert!(approx(plan.scale, 1.0));
    }

    #[test]
    fn empty_document_or_viewport_yields_no_slots() {
        assert!(resolve(&state(0, &[]), Size::new(100.0, 100.0), letter).is_empty());
        assert!(resolve(&state(2, &[]), Size::new(0.0, 100.0), letter).is_empty());
    }
}
