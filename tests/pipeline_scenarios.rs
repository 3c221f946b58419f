//! End-to-end layout and pipeline scenarios through the public API

use async_trait::async_trait;
use catalog_harmonize::{
    categorize, compute_scaling, process_image, Category, Dimensions, HarmonizeConfig,
    HarmonizeError, LayoutEngine, OutputFormat, OutputFormatHandler, ProductContext, Result,
    SegmentationCapability,
};
use image::{Rgba, RgbaImage};
use std::sync::Arc;

const CANVAS: Dimensions = Dimensions {
    width: 2000,
    height: 2500,
};

/// Cuts out a centered rectangle and makes everything else transparent
struct CenterCutout;

#[async_trait]
impl SegmentationCapability for CenterCutout {
    fn name(&self) -> &str {
        "center-cutout"
    }

    async fn run(&self, input: &[u8]) -> Result<Vec<u8>> {
        let source = image::load_from_memory(input)?.to_rgba8();
        let (width, height) = source.dimensions();
        let matte = RgbaImage::from_fn(width, height, |x, y| {
            let inside = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
            if inside {
                *source.get_pixel(x, y)
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        OutputFormatHandler::encode_png(&matte)
    }
}

fn photo(width: u32, height: u32) -> Vec<u8> {
    OutputFormatHandler::encode_png(&RgbaImage::from_pixel(width, height, Rgba([180, 60, 40, 255])))
        .unwrap()
}

#[test]
fn test_vase_is_tall_thin() -> Result<()> {
    let info = LayoutEngine::new(CANVAS).plan(Dimensions::new(1000, 2400), &ProductContext::new("Vase", ""))?;

    assert_eq!(info.category, Category::TallThin);
    assert_eq!(info.scaled.height, 2125);
    assert_eq!(info.scaled.width, 886);
    Ok(())
}

#[test]
fn test_banner_is_wide() -> Result<()> {
    let info = LayoutEngine::new(CANVAS).plan(Dimensions::new(3000, 1200), &ProductContext::new("Banner", ""))?;

    assert_eq!(info.category, Category::Wide);
    assert_eq!((info.scaled.width, info.scaled.height), (1640, 656));
    Ok(())
}

#[test]
fn test_enamel_pin_matches_keyword() -> Result<()> {
    let result = categorize(300, 300, "Enamel Pin", "")?;

    assert_eq!(result.category, Category::SmallAccessory);
    assert!(result.reason.contains("pin"), "reason was {}", result.reason);
    Ok(())
}

#[test]
fn test_mug_default_uncapped() -> Result<()> {
    let info = LayoutEngine::new(CANVAS).plan(Dimensions::new(1200, 1400), &ProductContext::new("Mug", ""))?;

    assert_eq!(info.category, Category::Default);
    assert!(!info.scaled.capped_at_max);
    assert_eq!((info.scaled.width, info.scaled.height), (1757, 2050));
    Ok(())
}

#[test]
fn test_small_wins_over_wide() -> Result<()> {
    let result = categorize(300, 150, "Poster", "Wall Art")?;
    assert_eq!(result.category, Category::SmallAccessory);
    assert!(result.reason.contains("Longest side"));
    Ok(())
}

#[test]
fn test_categorize_is_deterministic() -> Result<()> {
    let first = categorize(640, 1800, "Glass Bottle", "Kitchen")?;
    for _ in 0..10 {
        assert_eq!(categorize(640, 1800, "Glass Bottle", "Kitchen")?, first);
    }
    Ok(())
}

#[test]
fn test_zero_dimensions_rejected() {
    assert!(matches!(
        categorize(0, 100, "Mug", ""),
        Err(HarmonizeError::InvalidDimensions { .. })
    ));
    assert!(compute_scaling(100, 0, Category::Default, CANVAS).is_err());
}

#[test]
fn test_layout_invariants_hold_for_extreme_inputs() -> Result<()> {
    let engine = LayoutEngine::new(CANVAS);
    let sizes = [
        (1, 1),
        (1, 5000),
        (5000, 1),
        (499, 499),
        (501, 501),
        (600, 800),
        (4000, 4000),
        (20000, 300),
        (300, 20000),
    ];

    for (width, height) in sizes {
        for category in [Category::TallThin, Category::Wide, Category::SmallAccessory, Category::Default] {
            let info = compute_scaling(width, height, category, CANVAS)?;
            assert!(info.scaled.width <= CANVAS.width, "{}x{} {:?}", width, height, category);
            assert!(info.scaled.height <= CANVAS.height, "{}x{} {:?}", width, height, category);
            if category == Category::Default {
                assert!(info.scaled.scale_factor <= 1.5);
            }

            let shadow = engine.shadow(&info);
            assert!(shadow.width >= 100);
            assert!(shadow.height >= 15);
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_process_image_with_segmentation() -> Result<()> {
    let config = HarmonizeConfig::builder()
        .canvas_size(400, 500)
        .output_format(OutputFormat::Png)
        .build()?;
    let capability: Arc<dyn SegmentationCapability> = Arc::new(CenterCutout);

    let result = process_image(
        &photo(800, 1000),
        &ProductContext::new("Table Lamp", "Lighting"),
        &config,
        Some(capability),
    )
    .await?;

    assert_eq!(result.removal_strategy, "segmentation");
    assert_eq!(result.scaling_info.category, Category::Default);

    let canvas = image::load_from_memory(&result.buffer)?.to_rgba8();
    assert_eq!(canvas.dimensions(), (400, 500));
    assert_eq!(canvas.get_pixel(0, 0), &Rgba([243, 243, 244, 255]));

    let (x, y) = result.scaling_info.center_offset();
    let center = canvas.get_pixel(
        x + result.scaling_info.scaled.width / 2,
        y + result.scaling_info.scaled.height / 2,
    );
    assert!(center[0] > 150 && center[2] < 80, "unexpected center {:?}", center);
    Ok(())
}

#[tokio::test]
async fn test_process_image_jpeg_output() -> Result<()> {
    let config = HarmonizeConfig::builder()
        .canvas_size(200, 250)
        .output_format(OutputFormat::Jpeg)
        .output_quality(80)
        .build()?;

    let result = process_image(&photo(120, 90), &ProductContext::default(), &config, None).await?;

    assert_eq!(
        image::guess_format(&result.buffer)?,
        image::ImageFormat::Jpeg
    );
    assert_eq!(result.scaling_info.category, Category::SmallAccessory);
    Ok(())
}
