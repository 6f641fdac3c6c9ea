//! Composition of slot rasters into the displayed image

use image::imageops;
use image::{Rgba, RgbaImage};

use super::color::invert_in_place;
use super::types::{RenderPlan, Rotation};

/// Canvas color around pages of unequal height
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Fill for slots whose raster is missing or failed
pub const PLACEHOLDER: Rgba<u8> = Rgba([204, 204, 204, 255]);

/// Assemble the composed image for `plan`.
///
/// `rasters[i]` belongs to `plan.slots[i]`; `None` draws a placeholder. The
/// result is rotated by the plan rotation and inverted in night mode. The
/// source rasters are only read. Returns `None` for an empty plan.
#[must_use]
pub fn compose<I>(plan: &RenderPlan, rasters: &[Option<I>], night_mode: bool) -> Option<RgbaImage>
where
    I: AsRef<RgbaImage>,
{
    let bounds = plan.content_bounds()?;
    let (width, height) = bounds.size().to_pixels();
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);

    for (index, slot) in plan.slots.iter().enumerate() {
        let x = (slot.dest.x - bounds.x).round() as i64;
        let y = (slot.dest.y - bounds.y).round() as i64;
        match rasters.get(index).and_then(Option::as_ref) {
            Some(raster) => {
                let raster: &RgbaImage = raster.as_ref();
                imageops::overlay(&mut canvas, raster, x, y);
            }
            None => {
                let (w, h) = slot.target_pixels();
                let placeholder = RgbaImage::from_pixel(w, h, PLACEHOLDER);
                imageops::overlay(&mut canvas, &placeholder, x, y);
            }
        }
    }

    let mut composed = match plan.rotation {
        Rotation::Deg0 => canvas,
        Rotation::Deg90 => imageops::rotate90(&canvas),
        Rotation::Deg180 => imageops::rotate180(&canvas),
        Rotation::Deg270 => imageops::rotate270(&canvas),
    };

    if night_mode {
        invert_in_place(&mut composed);
    }
    Some(composed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::viewer::types::{PageSlot, Rect};

    fn plan(rotation: Rotation) -> RenderPlan {
        RenderPlan {
            slots: vec![
                PageSlot {
                    page_index: 0,
                    crop: Rect::new(0.0, 0.0, 4.0, 6.0),
                    dest: Rect::new(10.0, 0.0, 4.0, 6.0),
                },
                PageSlot {
                    page_index: 1,
                    crop: Rect::new(0.0, 0.0, 4.0, 4.0),
                    dest: Rect::new(14.0, 1.0, 4.0, 4.0),
                },
            ],
            scale: 1.0,
            rotation,
        }
    }

    fn solid(w: u32, h: u32, value: u8) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, Rgba([value, value, value, 255])))
    }

    #[test]
    fn places_slots_edge_to_edge() {
        let rasters = [Some(solid(4, 6, 10)), Some(solid(4, 4, 20))];
        let image = compose(&plan(Rotation::Deg0), &rasters, false).unwrap();

        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(image.get_pixel(3, 0), &Rgba([10, 10, 10, 255]));
        assert_eq!(image.get_pixel(4, 1), &Rgba([20, 20, 20, 255]));
        assert_eq!(image.get_pixel(4, 0), &BACKGROUND);
    }

    #[test]
    fn missing_raster_draws_placeholder() {
        let rasters = [Some(solid(4, 6, 10)), None];
        let image = compose(&plan(Rotation::Deg0), &rasters, false).unwrap();
        assert_eq!(image.get_pixel(5, 2), &PLACEHOLDER);
    }

    #[test]
    fn rotation_and_night_mode_apply_to_composite() {
        let source = solid(4, 6, 10);
        let rasters = [Some(Arc::clone(&source)), Some(solid(4, 4, 20))];
        let image = compose(&plan(Rotation::Deg90), &rasters, true).unwrap();

        assert_eq!(image.dimensions(), (6, 8));
        // Top-left of the unrotated canvas ends up top-right after 90 cw
        assert_eq!(image.get_pixel(5, 0), &Rgba([245, 245, 245, 255]));
        assert_eq!(source.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));
    }

    #[test]
    fn empty_plan_composes_nothing() {
        let rasters: [Option<Arc<RgbaImage>>; 0] = [];
        assert!(compose(&RenderPlan::default(), &rasters, false).is_none());
    }
}
