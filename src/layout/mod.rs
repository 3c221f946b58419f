//! Deterministic layout engine: categorization, scaling and shadow geometry

pub mod categorizer;
pub mod scaler;
pub mod shadow;

pub use categorizer::categorize;
pub use scaler::{aspect_ratio, scale_dimensions, scaling_info};
pub use shadow::shadow_geometry;

use crate::error::Result;
use crate::types::{Dimensions, ProductContext, ScalingInfo, ShadowSpec};

/// Layout decisions for one canvas size
#[derive(Debug, Clone, Copy)]
pub struct LayoutEngine {
    canvas: Dimensions,
}

impl LayoutEngine {
    #[must_use]
    pub fn new(canvas: Dimensions) -> Self {
        Self { canvas }
    }

    #[must_use]
    pub fn canvas(&self) -> Dimensions {
        self.canvas
    }

    /// Categorize and scale an image of `original` size
    pub fn plan(&self, original: Dimensions, context: &ProductContext) -> Result<ScalingInfo> {
        let categorization = categorize(
            original.width,
            original.height,
            &context.title,
            &context.product_type,
        )?;
        scaling_info(original, categorization, self.canvas)
    }

    /// Contact shadow for a scaling decision made by this engine
    #[must_use]
    pub fn shadow(&self, info: &ScalingInfo) -> ShadowSpec {
        shadow_geometry(
            Dimensions::new(info.scaled.width, info.scaled.height),
            info.category,
            self.canvas,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn test_plan_and_shadow() {
        let engine = LayoutEngine::new(Dimensions::new(2000, 2500));
        let info = engine
            .plan(Dimensions::new(3000, 1200), &ProductContext::new("Banner", "Print"))
            .unwrap();
        assert_eq!(info.category, Category::Wide);
        assert_eq!((info.scaled.width, info.scaled.height), (1640, 656));

        let shadow = engine.shadow(&info);
        assert_eq!(shadow.x, 303);
        assert!(shadow.y > i64::from(info.center_offset().1));
    }
}
