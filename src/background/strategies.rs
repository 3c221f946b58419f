//! Background removal strategies, from best to most degraded

use crate::{
    background::trim::{auto_trim_borders, trim_alpha},
    config::TrimOptions,
    error::{HarmonizeError, Result},
    segmentation::SegmentationCapability,
    services::{ImageIOService, OutputFormatHandler},
};
use async_trait::async_trait;
use image::{DynamicImage, RgbaImage};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Image handed to every strategy: the decoded raster and its encoded form
#[derive(Debug, Clone, Copy)]
pub struct RemovalInput<'a> {
    pub image: &'a DynamicImage,
    pub encoded: &'a [u8],
}

/// One step of the background removal fallback chain
#[async_trait]
pub trait RemovalStrategy: Send + Sync {
    /// Identifier recorded on results and in logs
    fn name(&self) -> &'static str;

    /// Produce an alpha-matted foreground
    ///
    /// # Errors
    /// Any error makes the remover move on to the next strategy.
    async fn apply(&self, input: RemovalInput<'_>) -> Result<RgbaImage>;
}

/// Primary strategy: run the segmentation capability under a timeout
pub struct SegmentationStrategy {
    capability: Arc<dyn SegmentationCapability>,
    timeout: Duration,
    trim: TrimOptions,
    auto_trim: bool,
}

impl SegmentationStrategy {
    pub fn new(capability: Arc<dyn SegmentationCapability>, timeout: Duration) -> Self {
        Self {
            capability,
            timeout,
            trim: TrimOptions::default(),
            auto_trim: true,
        }
    }

    #[must_use]
    pub fn with_trim(mut self, trim: TrimOptions, auto_trim: bool) -> Self {
        self.trim = trim;
        self.auto_trim = auto_trim;
        self
    }

    /// Input bytes for the capability, with solid borders stripped when enabled
    fn prepare_input<'a>(&self, input: RemovalInput<'a>) -> Result<Cow<'a, [u8]>> {
        if !self.auto_trim {
            return Ok(Cow::Borrowed(input.encoded));
        }

        match auto_trim_borders(&input.image.to_rgba8(), &self.trim) {
            Some(trimmed) => {
                debug!(
                    width = trimmed.width(),
                    height = trimmed.height(),
                    "Auto-trimmed borders before segmentation"
                );
                Ok(Cow::Owned(OutputFormatHandler::encode_png(&trimmed)?))
            },
            None => Ok(Cow::Borrowed(input.encoded)),
        }
    }
}

#[async_trait]
impl RemovalStrategy for SegmentationStrategy {
    fn name(&self) -> &'static str {
        "segmentation"
    }

    async fn apply(&self, input: RemovalInput<'_>) -> Result<RgbaImage> {
        let prepared = self.prepare_input(input)?;

        let matte = self
            .capability
            .run_within(&prepared, self.timeout)
            .await
            .map_err(|e| match e {
                HarmonizeError::Segmentation(_) => e,
                other => HarmonizeError::segmentation(other.to_string()),
            })?;

        let decoded = image::load_from_memory(&matte).map_err(|e| {
            HarmonizeError::segmentation(format!("Capability returned an undecodable matte: {}", e))
        })?;

        trim_alpha(&decoded.to_rgba8(), self.trim.alpha_threshold)
            .ok_or_else(|| HarmonizeError::empty_result("Segmentation matte trimmed to nothing"))
    }
}

/// Re-trim an image that already carries transparency
pub struct AlphaTrimStrategy {
    threshold: u8,
}

impl AlphaTrimStrategy {
    #[must_use]
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl RemovalStrategy for AlphaTrimStrategy {
    fn name(&self) -> &'static str {
        "alpha_trim"
    }

    async fn apply(&self, input: RemovalInput<'_>) -> Result<RgbaImage> {
        if !ImageIOService::has_transparency(input.image) {
            return Err(HarmonizeError::empty_result("Source has no transparent pixels"));
        }

        trim_alpha(&input.image.to_rgba8(), self.threshold)
            .ok_or_else(|| HarmonizeError::empty_result("Source is fully transparent"))
    }
}

/// Force an alpha channel, strip solid borders when auto-trim is on, then
/// trim at the alpha threshold
pub struct ThresholdTrimStrategy {
    trim: TrimOptions,
    auto_trim: bool,
}

impl ThresholdTrimStrategy {
    #[must_use]
    pub fn new(trim: TrimOptions) -> Self {
        Self {
            trim,
            auto_trim: true,
        }
    }

    #[must_use]
    pub fn with_auto_trim(mut self, enabled: bool) -> Self {
        self.auto_trim = enabled;
        self
    }
}

#[async_trait]
impl RemovalStrategy for ThresholdTrimStrategy {
    fn name(&self) -> &'static str {
        "threshold_trim"
    }

    async fn apply(&self, input: RemovalInput<'_>) -> Result<RgbaImage> {
        let rgba = input.image.to_rgba8();
        let bordered = if self.auto_trim {
            auto_trim_borders(&rgba, &self.trim).unwrap_or(rgba)
        } else {
            rgba
        };

        trim_alpha(&bordered, self.trim.alpha_threshold)
            .ok_or_else(|| HarmonizeError::empty_result("Threshold trim removed every pixel"))
    }
}

/// Last resort: the untouched source with an alpha channel
pub struct OriginalWithAlphaStrategy;

#[async_trait]
impl RemovalStrategy for OriginalWithAlphaStrategy {
    fn name(&self) -> &'static str {
        "original_with_alpha"
    }

    async fn apply(&self, input: RemovalInput<'_>) -> Result<RgbaImage> {
        Ok(input.image.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct FixedMatte(Result<Vec<u8>>);

    #[async_trait]
    impl SegmentationCapability for FixedMatte {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn run(&self, _input: &[u8]) -> Result<Vec<u8>> {
            match &self.0 {
                Ok(bytes) => Ok(bytes.clone()),
                Err(e) => Err(HarmonizeError::internal(e.to_string())),
            }
        }
    }

    struct Hang;

    #[async_trait]
    impl SegmentationCapability for Hang {
        fn name(&self) -> &str {
            "hang"
        }

        async fn run(&self, _input: &[u8]) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn opaque_source() -> (DynamicImage, Vec<u8>) {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 30, Rgba([90, 120, 150, 255])));
        let encoded = OutputFormatHandler::encode_png(&image.to_rgba8()).unwrap();
        (image, encoded)
    }

    fn centered_matte() -> Vec<u8> {
        let mut matte = RgbaImage::from_pixel(40, 30, Rgba([0, 0, 0, 0]));
        for x in 10..20 {
            for y in 5..25 {
                matte.put_pixel(x, y, Rgba([90, 120, 150, 255]));
            }
        }
        OutputFormatHandler::encode_png(&matte).unwrap()
    }

    #[tokio::test]
    async fn test_segmentation_trims_matte() {
        let (image, encoded) = opaque_source();
        let strategy = SegmentationStrategy::new(
            Arc::new(FixedMatte(Ok(centered_matte()))),
            Duration::from_secs(5),
        );

        let result = strategy
            .apply(RemovalInput { image: &image, encoded: &encoded })
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (10, 20));
    }

    #[tokio::test]
    async fn test_segmentation_empty_matte_is_recoverable_error() {
        let (image, encoded) = opaque_source();
        let empty = OutputFormatHandler::encode_png(&RgbaImage::new(40, 30)).unwrap();
        let strategy =
            SegmentationStrategy::new(Arc::new(FixedMatte(Ok(empty))), Duration::from_secs(5));

        let result = strategy.apply(RemovalInput { image: &image, encoded: &encoded }).await;
        assert!(matches!(result, Err(HarmonizeError::EmptyResult(_))));
    }

    #[tokio::test]
    async fn test_segmentation_failure_and_garbage() {
        let (image, encoded) = opaque_source();

        let failing = SegmentationStrategy::new(
            Arc::new(FixedMatte(Err(HarmonizeError::internal("model crashed")))),
            Duration::from_secs(5),
        );
        let result = failing.apply(RemovalInput { image: &image, encoded: &encoded }).await;
        assert!(matches!(result, Err(HarmonizeError::Segmentation(_))));

        let garbage = SegmentationStrategy::new(
            Arc::new(FixedMatte(Ok(b"not a png".to_vec()))),
            Duration::from_secs(5),
        );
        let result = garbage.apply(RemovalInput { image: &image, encoded: &encoded }).await;
        assert!(matches!(result, Err(HarmonizeError::Segmentation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_segmentation_timeout() {
        let (image, encoded) = opaque_source();
        let strategy = SegmentationStrategy::new(Arc::new(Hang), Duration::from_secs(120));

        let result = strategy.apply(RemovalInput { image: &image, encoded: &encoded }).await;
        match result {
            Err(HarmonizeError::Segmentation(message)) => assert!(message.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other.map(|m| m.dimensions())),
        }
    }

    #[tokio::test]
    async fn test_alpha_trim_requires_transparency() {
        let (image, encoded) = opaque_source();
        let strategy = AlphaTrimStrategy::new(10);
        assert!(strategy
            .apply(RemovalInput { image: &image, encoded: &encoded })
            .await
            .is_err());

        let matte = image::load_from_memory(&centered_matte()).unwrap();
        let result = strategy
            .apply(RemovalInput { image: &matte, encoded: &encoded })
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (10, 20));
    }

    #[tokio::test]
    async fn test_threshold_trim_strips_white_border() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(200, 200, |x, y| {
            if (50..150).contains(&x) && (40..160).contains(&y) {
                Rgba([30, 60, 90, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }));
        let strategy = ThresholdTrimStrategy::new(TrimOptions::default());
        let result = strategy
            .apply(RemovalInput { image: &image, encoded: &[] })
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (100, 120));
    }

    #[tokio::test]
    async fn test_threshold_trim_keeps_border_without_auto_trim() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(400, 400, |x, y| {
            if (100..300).contains(&x) && (100..300).contains(&y) {
                Rgba([30, 60, 90, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }));
        let strategy = ThresholdTrimStrategy::new(TrimOptions::default()).with_auto_trim(false);
        let result = strategy
            .apply(RemovalInput { image: &image, encoded: &[] })
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (400, 400));
    }

    #[tokio::test]
    async fn test_original_with_alpha_never_fails() {
        let (image, encoded) = opaque_source();
        let result = OriginalWithAlphaStrategy
            .apply(RemovalInput { image: &image, encoded: &encoded })
            .await
            .unwrap();
        assert_eq!(result.dimensions(), (40, 30));
        assert_eq!(result.get_pixel(0, 0)[3], 255);
    }
}
