//! Shape and keyword based product categorization

use crate::error::{HarmonizeError, Result};
use crate::types::{Categorization, Category, Dimensions};

/// Keywords that mark a product as a small accessory, searched in this order
pub const SMALL_ACCESSORY_KEYWORDS: [&str; 9] = [
    "pin", "badge", "sticker", "card", "bookmark", "keychain", "magnet", "patch", "button",
];

/// Images whose longest side is below this are treated as small accessories
pub const SMALL_LONGEST_SIDE_PX: u32 = 500;

/// Width/height ratio below which a product is tall and thin
pub const TALL_THIN_MAX_ASPECT: f64 = 0.5;

/// Width/height ratio above which a product is wide
pub const WIDE_MIN_ASPECT: f64 = 1.5;

/// Categorize an image by its dimensions and product text
///
/// Rules are evaluated in priority order and the first match wins:
/// small accessory (keyword or size), tall/thin, wide, default. When both
/// small-accessory conditions hold the reason names the keyword.
///
/// # Errors
/// - `InvalidDimensions` when either side is zero
pub fn categorize(width: u32, height: u32, title: &str, product_type: &str) -> Result<Categorization> {
    if width == 0 || height == 0 {
        return Err(HarmonizeError::invalid_dimensions(width, height));
    }

    let dimensions = Dimensions::new(width, height);
    let aspect_ratio = f64::from(width) / f64::from(height);
    let longest_side = dimensions.longest_side();

    if let Some(keyword) = matching_keyword(title, product_type) {
        return Ok(Categorization {
            category: Category::SmallAccessory,
            reason: format!("Contains keyword: {}", keyword),
        });
    }

    if longest_side < SMALL_LONGEST_SIDE_PX {
        return Ok(Categorization {
            category: Category::SmallAccessory,
            reason: format!("Longest side ({}px) < {}px", longest_side, SMALL_LONGEST_SIDE_PX),
        });
    }

    if aspect_ratio < TALL_THIN_MAX_ASPECT {
        return Ok(Categorization {
            category: Category::TallThin,
            reason: format!("Aspect ratio {:.2} < 0.5 (height > 2× width)", aspect_ratio),
        });
    }

    if aspect_ratio > WIDE_MIN_ASPECT {
        return Ok(Categorization {
            category: Category::Wide,
            reason: format!("Aspect ratio {:.2} > 1.5 (width > 1.5× height)", aspect_ratio),
        });
    }

    Ok(Categorization {
        category: Category::Default,
        reason: format!("Standard aspect ratio {:.2}", aspect_ratio),
    })
}

/// First small-accessory keyword contained in the combined product text
fn matching_keyword(title: &str, product_type: &str) -> Option<&'static str> {
    let search_text = format!("{} {}", title, product_type).to_lowercase();
    SMALL_ACCESSORY_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| search_text.contains(keyword))
}
