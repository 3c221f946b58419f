//! Background remover driving the ordered strategy chain

use crate::{
    background::strategies::{
        AlphaTrimStrategy, OriginalWithAlphaStrategy, RemovalInput, RemovalStrategy,
        SegmentationStrategy, ThresholdTrimStrategy,
    },
    config::HarmonizeConfig,
    segmentation::SegmentationCapability,
    services::{ImageIOService, OutputFormatHandler},
};
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Foreground produced by the remover together with the strategy that made it
#[derive(Debug, Clone)]
pub struct Removal {
    pub image: RgbaImage,
    pub strategy: &'static str,
}

/// Turns a photo into an alpha-matted foreground, tolerating segmentation failure
///
/// Strategies are tried in order until one succeeds. The chain always ends in
/// an infallible step, so removal never fails for a decodable input.
pub struct BackgroundRemover {
    strategies: Vec<Box<dyn RemovalStrategy>>,
}

impl BackgroundRemover {
    /// Remover with an explicit strategy list
    pub fn new(strategies: Vec<Box<dyn RemovalStrategy>>) -> Self {
        Self { strategies }
    }

    /// Standard chain for a run configuration
    ///
    /// The segmentation step is included only when background removal is
    /// enabled and a capability is available.
    pub fn from_config(
        config: &HarmonizeConfig,
        capability: Option<Arc<dyn SegmentationCapability>>,
    ) -> Self {
        let mut strategies: Vec<Box<dyn RemovalStrategy>> = Vec::with_capacity(4);

        match capability {
            Some(capability) if config.enable_background_removal => {
                strategies.push(Box::new(
                    SegmentationStrategy::new(capability, config.segmentation_timeout())
                        .with_trim(config.trim, config.enable_auto_trim),
                ));
            },
            Some(_) => debug!("Background removal disabled, segmentation capability unused"),
            None => debug!("No segmentation capability configured"),
        }

        strategies.push(Box::new(AlphaTrimStrategy::new(config.trim.alpha_threshold)));
        strategies.push(Box::new(
            ThresholdTrimStrategy::new(config.trim).with_auto_trim(config.enable_auto_trim),
        ));
        strategies.push(Box::new(OriginalWithAlphaStrategy));

        Self::new(strategies)
    }

    /// Names of the configured strategies in the order they are tried
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Remove the background from a decoded image
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub async fn remove_image(&self, image: &DynamicImage, encoded: &[u8]) -> Removal {
        let input = RemovalInput { image, encoded };

        for strategy in &self.strategies {
            match strategy.apply(input).await {
                Ok(result) => {
                    debug!(
                        strategy = strategy.name(),
                        width = result.width(),
                        height = result.height(),
                        "Background removal succeeded"
                    );
                    return Removal {
                        image: result,
                        strategy: strategy.name(),
                    };
                },
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Background removal step failed, falling back");
                },
            }
        }

        Removal {
            image: image.to_rgba8(),
            strategy: OriginalWithAlphaStrategy.name(),
        }
    }

    /// Remove the background from an encoded image
    ///
    /// Never fails: returns a PNG matte for any decodable input, and the
    /// input bytes unchanged when they cannot be decoded.
    pub async fn remove(&self, buffer: &[u8]) -> Vec<u8> {
        let source = match ImageIOService::decode(buffer) {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Input is not decodable, returning it unchanged");
                return buffer.to_vec();
            },
        };

        let removal = self.remove_image(&source.image, buffer).await;
        match OutputFormatHandler::encode_png(&removal.image) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Failed to encode matte, returning source with alpha");
                OutputFormatHandler::encode_png(&source.image.to_rgba8())
                    .unwrap_or_else(|_| buffer.to_vec())
            },
        }
    }
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HarmonizeError, Result};
    use async_trait::async_trait;
    use image::Rgba;

    struct AlwaysFails;

    #[async_trait]
    impl SegmentationCapability for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }

        async fn run(&self, _input: &[u8]) -> Result<Vec<u8>> {
            Err(HarmonizeError::segmentation("injected fault"))
        }
    }

    struct Failing(&'static str);

    #[async_trait]
    impl RemovalStrategy for Failing {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn apply(&self, _input: RemovalInput<'_>) -> Result<RgbaImage> {
            Err(HarmonizeError::internal("nope"))
        }
    }

    fn opaque_png() -> Vec<u8> {
        OutputFormatHandler::encode_png(&RgbaImage::from_pixel(30, 20, Rgba([120, 80, 40, 255]))).unwrap()
    }

    #[test]
    fn test_chain_order_from_config() {
        let config = HarmonizeConfig::default();
        let remover = BackgroundRemover::from_config(&config, Some(Arc::new(AlwaysFails)));
        assert_eq!(
            remover.strategy_names(),
            vec!["segmentation", "alpha_trim", "threshold_trim", "original_with_alpha"]
        );

        let disabled = HarmonizeConfig::builder()
            .enable_background_removal(false)
            .build()
            .unwrap();
        let remover = BackgroundRemover::from_config(&disabled, Some(Arc::new(AlwaysFails)));
        assert_eq!(remover.strategy_names().first(), Some(&"alpha_trim"));
    }

    #[tokio::test]
    async fn test_remove_falls_back_when_capability_fails() {
        let remover =
            BackgroundRemover::from_config(&HarmonizeConfig::default(), Some(Arc::new(AlwaysFails)));
        let output = remover.remove(&opaque_png()).await;

        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
        assert!(decoded.color().has_alpha());
    }

    #[tokio::test]
    async fn test_remove_with_only_failing_strategies_still_returns_image() {
        let strategies: Vec<Box<dyn RemovalStrategy>> =
            vec![Box::new(Failing("a")), Box::new(Failing("b"))];
        let remover = BackgroundRemover::new(strategies);
        let image = image::load_from_memory(&opaque_png()).unwrap();

        let removal = remover.remove_image(&image, &[]).await;
        assert_eq!(removal.strategy, "original_with_alpha");
        assert_eq!(removal.image.dimensions(), (30, 20));
    }

    #[tokio::test]
    async fn test_remove_returns_undecodable_input_unchanged() {
        let remover = BackgroundRemover::from_config(&HarmonizeConfig::default(), None);
        let output = remover.remove(b"garbage").await;
        assert_eq!(output, b"garbage");
    }
}
