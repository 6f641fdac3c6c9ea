//! Night-mode color inversion

use image::RgbaImage;

/// Invert RGB channels of every pixel, keeping alpha.
///
/// Returns a new image; the source is left untouched so cached rasters can
/// be reused in day mode.
#[must_use]
pub fn invert(image: &RgbaImage) -> RgbaImage {
    let mut inverted = image.clone();
    invert_in_place(&mut inverted);
    inverted
}

/// In-place variant for images the caller already owns
pub fn invert_in_place(image: &mut RgbaImage) {
    for px in image.chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}
