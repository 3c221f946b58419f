//! Contact shadow geometry

use crate::types::{center_offset, Category, Dimensions, ShadowSpec};

/// Smallest shadow ellipse width in pixels
pub const MIN_SHADOW_WIDTH: u32 = 100;

/// Smallest shadow ellipse height in pixels
pub const MIN_SHADOW_HEIGHT: u32 = 15;

/// Compute the contact shadow for a product of `scaled` size centered on `canvas`
///
/// The ellipse is horizontally centered on the canvas and its vertical
/// center sits at the product's base.
#[must_use]
pub fn shadow_geometry(scaled: Dimensions, category: Category, canvas: Dimensions) -> ShadowSpec {
    let width = f64::from(scaled.width);
    let height = f64::from(scaled.height);
    let aspect = if scaled.height == 0 { 0.0 } else { width / height };

    let (shadow_width, shadow_height) = if category == Category::TallThin || aspect < 0.5 {
        let shadow_width = width * 1.4;
        (shadow_width, shadow_width * 0.15)
    } else if category == Category::Wide || aspect > 1.5 {
        let shadow_width = width * 0.85;
        (shadow_width, shadow_width * 0.12)
    } else if category == Category::SmallAccessory {
        let shadow_width = width * 0.9;
        (shadow_width, shadow_width * 0.18)
    } else {
        let base = (width * 0.7).max(width.min(height));
        (base * 0.85, base * 0.15)
    };

    let shadow_width = (shadow_width.round() as u32).max(MIN_SHADOW_WIDTH);
    let shadow_height = (shadow_height.round() as u32).max(MIN_SHADOW_HEIGHT);

    let center_y = i64::from(center_offset(canvas.height, scaled.height));
    let ry = half_rounded(shadow_height);

    ShadowSpec {
        width: shadow_width,
        height: shadow_height,
        x: ((f64::from(canvas.width) - f64::from(shadow_width)) / 2.0).round() as i64,
        y: center_y + i64::from(scaled.height) - i64::from(ry),
        rx: half_rounded(shadow_width),
        ry,
    }
}

fn half_rounded(value: u32) -> u32 {
    (f64::from(value) / 2.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Dimensions = Dimensions {
        width: 2000,
        height: 2500,
    };

    #[test]
    fn test_tall_thin_shadow_is_wider_than_product() {
        let shadow = shadow_geometry(Dimensions::new(886, 2125), Category::TallThin, CANVAS);
        assert_eq!(shadow.width, 1240);
        assert_eq!(shadow.height, 186);
        assert_eq!(shadow.x, 380);
        assert_eq!(shadow.rx, 620);
        assert_eq!(shadow.ry, 93);
        // Product top is at 188, base at 2313
        assert_eq!(shadow.y, 188 + 2125 - 93);
    }

    #[test]
    fn test_wide_shadow() {
        let shadow = shadow_geometry(Dimensions::new(1640, 656), Category::Wide, CANVAS);
        assert_eq!(shadow.width, 1394);
        assert_eq!(shadow.height, 167);
    }

    #[test]
    fn test_small_accessory_shadow() {
        let shadow = shadow_geometry(Dimensions::new(1000, 1000), Category::SmallAccessory, CANVAS);
        assert_eq!(shadow.width, 900);
        assert_eq!(shadow.height, 162);
    }

    #[test]
    fn test_default_shadow_uses_base() {
        let shadow = shadow_geometry(Dimensions::new(1757, 2050), Category::Default, CANVAS);
        // base = max(1229.9, 1757) = 1757
        assert_eq!(shadow.width, 1493);
        assert_eq!(shadow.height, 264);
    }

    #[test]
    fn test_aspect_overrides_default_category() {
        let by_aspect = shadow_geometry(Dimensions::new(400, 1000), Category::Default, CANVAS);
        let tall = shadow_geometry(Dimensions::new(400, 1000), Category::TallThin, CANVAS);
        assert_eq!(by_aspect, tall);
    }

    #[test]
    fn test_floor_applies_to_degenerate_products() {
        for scaled in [Dimensions::new(1, 1), Dimensions::new(1, 2500), Dimensions::new(2000, 1), Dimensions::new(0, 0)] {
            for category in [Category::TallThin, Category::Wide, Category::SmallAccessory, Category::Default] {
                let shadow = shadow_geometry(scaled, category, CANVAS);
                assert!(shadow.width >= MIN_SHADOW_WIDTH);
                assert!(shadow.height >= MIN_SHADOW_HEIGHT);
            }
        }
    }

    #[test]
    fn test_oversized_shadow_extends_past_left_edge() {
        let shadow = shadow_geometry(Dimensions::new(1900, 2500), Category::TallThin, CANVAS);
        assert_eq!(shadow.width, 2660);
        assert_eq!(shadow.x, -330);
    }
}
