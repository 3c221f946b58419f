//! Category-specific target sizing with canvas clamping

use crate::error::{HarmonizeError, Result};
use crate::types::{Categorization, Category, Dimensions, ScaledDimensions, ScalingInfo};

/// Tall/thin products fill this share of the canvas height
pub const TALL_THIN_HEIGHT_RATIO: f64 = 0.85;

/// Wide products fill this share of the canvas width
pub const WIDE_WIDTH_RATIO: f64 = 0.82;

/// Small accessories fill this share of the canvas height
pub const SMALL_ACCESSORY_HEIGHT_RATIO: f64 = 0.50;

/// Default products scale their longest side to this share of the canvas height
pub const DEFAULT_LONGEST_SIDE_RATIO: f64 = 0.82;

/// Maximum upscale factor for default-category products
pub const MAX_UPSCALE: f64 = 1.5;

/// Width/height ratio rounded to three decimals
///
/// The rounded value drives the aspect-preserving rules so that the reported
/// `aspect_ratio` and the scaled sizes agree exactly.
#[must_use]
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        return 0.0;
    }
    (f64::from(width) / f64::from(height) * 1000.0).round() / 1000.0
}

/// Compute target dimensions for an image of `original` size in `category`
///
/// The per-category rule runs first, then the result is clamped to the
/// canvas width and afterwards to the canvas height.
///
/// # Errors
/// - `InvalidDimensions` when the original or canvas has a zero side
pub fn scale_dimensions(
    original: Dimensions,
    category: Category,
    canvas: Dimensions,
) -> Result<ScaledDimensions> {
    if original.width == 0 || original.height == 0 {
        return Err(HarmonizeError::invalid_dimensions(original.width, original.height));
    }
    if canvas.width == 0 || canvas.height == 0 {
        return Err(HarmonizeError::configuration(format!(
            "Canvas must have a non-zero size, got {}",
            canvas
        )));
    }

    let aspect = aspect_ratio(original.width, original.height);
    let canvas_width = f64::from(canvas.width);
    let canvas_height = f64::from(canvas.height);
    let mut capped_at_max = false;

    let (mut width, mut height) = match category {
        Category::TallThin => {
            let height = (canvas_height * TALL_THIN_HEIGHT_RATIO).round();
            ((height * aspect).round(), height)
        }
        Category::Wide => {
            let width = (canvas_width * WIDE_WIDTH_RATIO).round();
            (width, (width / aspect).round())
        }
        Category::SmallAccessory => {
            let height = (canvas_height * SMALL_ACCESSORY_HEIGHT_RATIO).round();
            ((height * aspect).round(), height)
        }
        Category::Default => {
            let uncapped = canvas_height * DEFAULT_LONGEST_SIDE_RATIO / f64::from(original.longest_side());
            capped_at_max = uncapped > MAX_UPSCALE;
            let factor = uncapped.min(MAX_UPSCALE);
            // Rounding must not push tiny originals past the upscale cap
            let fit = |side: u32| {
                let side = f64::from(side);
                (side * factor).round().min((side * MAX_UPSCALE).floor())
            };
            (fit(original.width), fit(original.height))
        }
    };

    if width > canvas_width {
        let ratio = canvas_width / width;
        width = canvas_width;
        height = (height * ratio).round();
    }

    if height > canvas_height {
        let ratio = canvas_height / height;
        height = canvas_height;
        width = (width * ratio).round();
    }

    let width = width.max(1.0) as u32;
    let height = height.max(1.0) as u32;

    Ok(ScaledDimensions {
        width,
        height,
        scale_factor: f64::from(width) / f64::from(original.width),
        capped_at_max,
    })
}

/// Build the complete scaling decision for an already categorized image
///
/// # Errors
/// - `InvalidDimensions` when the original has a zero side
pub fn scaling_info(
    original: Dimensions,
    categorization: Categorization,
    canvas: Dimensions,
) -> Result<ScalingInfo> {
    let scaled = scale_dimensions(original, categorization.category, canvas)?;

    Ok(ScalingInfo {
        original,
        category: categorization.category,
        reason: categorization.reason,
        scaled,
        canvas,
        aspect_ratio: aspect_ratio(original.width, original.height),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Dimensions = Dimensions {
        width: 2000,
        height: 2500,
    };

    fn scale(width: u32, height: u32, category: Category) -> ScaledDimensions {
        scale_dimensions(Dimensions::new(width, height), category, CANVAS).unwrap()
    }

    #[test]
    fn test_tall_thin_vase() {
        let scaled = scale(1000, 2400, Category::TallThin);
        assert_eq!((scaled.width, scaled.height), (886, 2125));
        assert!(!scaled.capped_at_max);
        assert!((scaled.scale_factor - 0.886).abs() < 1e-9);
    }

    #[test]
    fn test_wide_banner() {
        let scaled = scale(3000, 1200, Category::Wide);
        assert_eq!((scaled.width, scaled.height), (1640, 656));
    }

    #[test]
    fn test_small_accessory_half_height() {
        let scaled = scale(300, 300, Category::SmallAccessory);
        assert_eq!((scaled.width, scaled.height), (1250, 1250));
    }

    #[test]
    fn test_default_mug_not_capped() {
        let scaled = scale(1200, 1400, Category::Default);
        assert_eq!((scaled.width, scaled.height), (1757, 2050));
        assert!(!scaled.capped_at_max);
        assert!(scaled.scale_factor <= MAX_UPSCALE);
    }

    #[test]
    fn test_default_upscale_capped() {
        let scaled = scale(600, 800, Category::Default);
        assert!(scaled.capped_at_max);
        assert_eq!((scaled.width, scaled.height), (900, 1200));
        assert!((scaled.scale_factor - MAX_UPSCALE).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_to_canvas_width() {
        // A wide-ish image forced into the small accessory rule overflows the width
        let scaled = scale(4000, 1000, Category::SmallAccessory);
        assert_eq!(scaled.width, 2000);
        assert_eq!(scaled.height, 500);
    }

    #[test]
    fn test_clamp_to_canvas_height() {
        // Tall/thin rule on a square image is fine, wide rule on a tall one is not
        let scaled = scale(1000, 3000, Category::Wide);
        assert_eq!(scaled.height, 2500);
        assert!(scaled.width <= 2000);
    }

    #[test]
    fn test_canvas_fit_holds_for_every_category() {
        let sizes = [(1, 1), (1, 9000), (9000, 1), (480, 2400), (2400, 480), (3000, 3000), (1999, 2501)];
        let categories = [
            Category::TallThin,
            Category::Wide,
            Category::SmallAccessory,
            Category::Default,
        ];

        for &(width, height) in &sizes {
            for &category in &categories {
                let scaled = scale(width, height, category);
                assert!(scaled.width >= 1 && scaled.width <= CANVAS.width, "{width}x{height} {category}");
                assert!(scaled.height >= 1 && scaled.height <= CANVAS.height, "{width}x{height} {category}");
                if category == Category::Default {
                    assert!(scaled.scale_factor <= MAX_UPSCALE + 1e-9);
                } else {
                    assert!(!scaled.capped_at_max);
                }
            }
        }
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = scale_dimensions(Dimensions::new(0, 0), Category::Default, CANVAS);
        assert!(matches!(result, Err(HarmonizeError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_scaling_info_aspect_is_rounded() {
        let info = scaling_info(
            Dimensions::new(1200, 1400),
            Categorization {
                category: Category::Default,
                reason: "Standard aspect ratio 0.86".to_string(),
            },
            CANVAS,
        )
        .unwrap();
        assert!((info.aspect_ratio - 0.857).abs() < 1e-12);
        assert_eq!(info.canvas, CANVAS);
        assert_eq!(info.center_offset(), (122, 225));
    }
}
