//! Border and alpha trimming on RGBA rasters

use crate::config::TrimOptions;
use image::{imageops, Rgba, RgbaImage};

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Solid border colors recognized by the auto-trim pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderColor {
    Black,
    White,
}

impl BorderColor {
    fn matches(self, pixel: &Rgba<u8>, tolerance: u8) -> bool {
        let [r, g, b, _] = pixel.0;
        match self {
            Self::Black => r.max(g).max(b) <= tolerance,
            Self::White => r.min(g).min(b) >= u8::MAX - tolerance,
        }
    }
}

/// Bounding box of the pixels for which `keep` holds
fn content_bounds<F>(image: &RgbaImage, keep: F) -> Option<Bounds>
where
    F: Fn(&Rgba<u8>) -> bool,
{
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if keep(pixel) {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Bounding box of pixels whose alpha exceeds `threshold`
#[must_use]
pub fn alpha_bounds(image: &RgbaImage, threshold: u8) -> Option<Bounds> {
    content_bounds(image, |pixel| pixel[3] > threshold)
}

/// Crop away fully transparent margins
///
/// Returns `None` when no pixel is above the threshold, i.e. the matte is
/// empty.
#[must_use]
pub fn trim_alpha(image: &RgbaImage, threshold: u8) -> Option<RgbaImage> {
    alpha_bounds(image, threshold).map(|bounds| crop(image, bounds))
}

/// Crop away one solid border color if the removed margin is significant
///
/// The trim is committed only when more than `min_change_px` pixels would be
/// removed along either axis, so a thin noisy edge is never mistaken for a
/// border.
#[must_use]
pub fn trim_border(image: &RgbaImage, color: BorderColor, options: &TrimOptions) -> Option<RgbaImage> {
    let bounds = content_bounds(image, |pixel| !color.matches(pixel, options.border_tolerance))?;

    let removed_x = image.width() - bounds.width;
    let removed_y = image.height() - bounds.height;

    if removed_x > options.min_change_px || removed_y > options.min_change_px {
        log::debug!(
            "Trimming {:?} border: {}x{} -> {}x{}",
            color,
            image.width(),
            image.height(),
            bounds.width,
            bounds.height
        );
        Some(crop(image, bounds))
    } else {
        None
    }
}

/// Strip solid black and white borders, each considered independently
///
/// Returns `None` when neither trim was committed.
#[must_use]
pub fn auto_trim_borders(image: &RgbaImage, options: &TrimOptions) -> Option<RgbaImage> {
    let after_black = trim_border(image, BorderColor::Black, options);
    let current = after_black.as_ref().unwrap_or(image);

    match trim_border(current, BorderColor::White, options) {
        Some(trimmed) => Some(trimmed),
        None => after_black,
    }
}

fn crop(image: &RgbaImage, bounds: Bounds) -> RgbaImage {
    imageops::crop_imm(image, bounds.x, bounds.y, bounds.width, bounds.height).to_image()
}
