//! Configuration types for harmonization runs

use crate::error::{HarmonizeError, Result};
use crate::services::OutputFormatHandler;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Solid canvas background color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        self.0
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self([0xf3, 0xf3, 0xf4])
    }
}

impl FromStr for BackgroundColor {
    type Err = HarmonizeError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || HarmonizeError::configuration(format!("Invalid background color '{}'", s));

        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };

        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|part| u8::from_str_radix(part, 16).ok())
                .ok_or_else(invalid)
        };

        Ok(Self([channel(0..2)?, channel(2..4)?, channel(4..6)?]))
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = HarmonizeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        color.to_hex()
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Fixed-size output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
    pub background_color: BackgroundColor,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2500,
            background_color: BackgroundColor::default(),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// WebP (lossless; quality does not apply)
    WebP,
    /// JPEG at the configured quality
    Jpeg,
    /// PNG (lossless)
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::WebP
    }
}

impl FromStr for OutputFormat {
    type Err = HarmonizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(HarmonizeError::unsupported_format(other)),
        }
    }
}

/// Thresholds for border and alpha trimming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimOptions {
    /// Max channel distance from pure black/white still treated as border
    pub border_tolerance: u8,
    /// A border trim is committed only when it removes more than this many pixels on an axis
    pub min_change_px: u32,
    /// Pixels with alpha at or below this value count as transparent
    pub alpha_threshold: u8,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            border_tolerance: 12,
            min_change_px: 30,
            alpha_threshold: 10,
        }
    }
}

/// Configuration for a harmonization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct HarmonizeConfig {
    pub canvas: CanvasConfig,

    /// Contact shadow opacity (0-1)
    pub shadow_opacity: f32,

    pub output_format: OutputFormat,

    /// Encoder quality (0-100, used by lossy formats)
    pub output_quality: u8,

    /// Products processed concurrently per chunk
    pub max_concurrent: usize,

    /// Strip solid black/white borders around the segmentation input
    pub enable_auto_trim: bool,

    /// Run the segmentation capability; when off the fallback chain starts at alpha trimming
    pub enable_background_removal: bool,

    /// Run the pipeline without upload/delete side effects
    pub dry_run: bool,

    /// Pause between chunks to stay under collaborator rate limits
    pub chunk_delay_ms: u64,

    /// Upper bound for one segmentation invocation
    pub segmentation_timeout_secs: u64,

    pub trim: TrimOptions,
}

const DEFAULT_OUTPUT_QUALITY: u8 = 90;

impl Default for HarmonizeConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            shadow_opacity: 0.18,
            output_format: OutputFormat::default(),
            output_quality: DEFAULT_OUTPUT_QUALITY,
            max_concurrent: 5,
            enable_auto_trim: true,
            enable_background_removal: true,
            dry_run: false,
            chunk_delay_ms: 1000,
            segmentation_timeout_secs: 120,
            trim: TrimOptions::default(),
        }
    }
}

impl HarmonizeConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_harmonize::{HarmonizeConfig, OutputFormat};
    ///
    /// let config = HarmonizeConfig::builder()
    ///     .canvas_size(1000, 1250)
    ///     .output_format(OutputFormat::Jpeg)
    ///     .max_concurrent(3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.canvas.width, 1000);
    /// ```
    #[must_use]
    pub fn builder() -> HarmonizeConfigBuilder {
        HarmonizeConfigBuilder::default()
    }

    /// Load configuration from environment variables on top of the defaults
    ///
    /// Recognized: `CANVAS_WIDTH`, `CANVAS_HEIGHT`, `BACKGROUND_COLOR`, `SHADOW_OPACITY`,
    /// `OUTPUT_QUALITY` (or `WEBP_QUALITY`), `OUTPUT_FORMAT`, `DRY_RUN`,
    /// `MAX_CONCURRENT_PROCESSES`, `ENABLE_AUTO_TRIM`, `ENABLE_BACKGROUND_REMOVAL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`HarmonizeConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CANVAS_WIDTH") {
            config.canvas.width = parse_env("CANVAS_WIDTH", &value)?;
        }
        if let Some(value) = lookup("CANVAS_HEIGHT") {
            config.canvas.height = parse_env("CANVAS_HEIGHT", &value)?;
        }
        if let Some(value) = lookup("BACKGROUND_COLOR") {
            config.canvas.background_color = value.parse()?;
        }
        if let Some(value) = lookup("SHADOW_OPACITY") {
            config.shadow_opacity = parse_env("SHADOW_OPACITY", &value)?;
        }
        if let Some(value) = lookup("OUTPUT_QUALITY").or_else(|| lookup("WEBP_QUALITY")) {
            config.output_quality = parse_env("OUTPUT_QUALITY", &value)?;
        }
        if let Some(value) = lookup("OUTPUT_FORMAT") {
            config.output_format = value.parse()?;
        }
        if let Some(value) = lookup("DRY_RUN") {
            config.dry_run = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(value) = lookup("MAX_CONCURRENT_PROCESSES") {
            config.max_concurrent = parse_env("MAX_CONCURRENT_PROCESSES", &value)?;
        }
        if let Some(value) = lookup("ENABLE_AUTO_TRIM") {
            config.enable_auto_trim = !value.trim().eq_ignore_ascii_case("false");
        }
        if let Some(value) = lookup("ENABLE_BACKGROUND_REMOVAL") {
            config.enable_background_removal = value.trim().eq_ignore_ascii_case("true");
        }

        config.validate()?;
        Ok(config)
    }

    /// True when a quality was set explicitly for a format whose encoder ignores it
    #[must_use]
    pub fn quality_ignored(&self) -> bool {
        self.output_quality != DEFAULT_OUTPUT_QUALITY
            && !OutputFormatHandler::uses_quality(self.output_format)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero canvas width or height
    /// - Shadow opacity outside 0-1
    /// - Output quality above 100
    /// - Zero `max_concurrent`
    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(HarmonizeError::configuration(format!(
                "Canvas must have a non-zero size, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }

        if !(0.0..=1.0).contains(&self.shadow_opacity) {
            return Err(HarmonizeError::config_value_error(
                "shadow opacity",
                self.shadow_opacity,
                "0-1",
                Some(0.18),
            ));
        }

        if self.output_quality > 100 {
            return Err(HarmonizeError::config_value_error(
                "output quality",
                self.output_quality,
                "0-100",
                Some(DEFAULT_OUTPUT_QUALITY),
            ));
        }

        if self.max_concurrent == 0 {
            return Err(HarmonizeError::config_value_error(
                "max concurrent",
                self.max_concurrent,
                ">= 1",
                Some(5),
            ));
        }

        Ok(())
    }

    #[must_use]
    pub fn chunk_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.chunk_delay_ms)
    }

    #[must_use]
    pub fn segmentation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.segmentation_timeout_secs)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        HarmonizeError::configuration(format!("{} has an invalid value '{}'", key, value))
    })
}

/// Builder for `HarmonizeConfig`
#[derive(Debug, Default)]
pub struct HarmonizeConfigBuilder {
    config: HarmonizeConfig,
}

impl HarmonizeConfigBuilder {
    #[must_use]
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas.width = width;
        self.config.canvas.height = height;
        self
    }

    #[must_use]
    pub fn background_color(mut self, color: BackgroundColor) -> Self {
        self.config.canvas.background_color = color;
        self
    }

    #[must_use]
    pub fn shadow_opacity(mut self, opacity: f32) -> Self {
        self.config.shadow_opacity = opacity;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set output quality (clamped to 100)
    #[must_use]
    pub fn output_quality(mut self, quality: u8) -> Self {
        self.config.output_quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    #[must_use]
    pub fn enable_auto_trim(mut self, enable: bool) -> Self {
        self.config.enable_auto_trim = enable;
        self
    }

    #[must_use]
    pub fn enable_background_removal(mut self, enable: bool) -> Self {
        self.config.enable_background_removal = enable;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn chunk_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.chunk_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn segmentation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.segmentation_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn trim(mut self, trim: TrimOptions) -> Self {
        self.config.trim = trim;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<HarmonizeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_catalog_template() {
        let config = HarmonizeConfig::default();
        assert_eq!(config.canvas.width, 2000);
        assert_eq!(config.canvas.height, 2500);
        assert_eq!(config.canvas.background_color.to_hex(), "#f3f3f4");
        assert!((config.shadow_opacity - 0.18).abs() < f32::EPSILON);
        assert_eq!(config.max_concurrent, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_background_color_parsing() {
        assert_eq!("#ffffff".parse::<BackgroundColor>().unwrap().rgb(), [255, 255, 255]);
        assert_eq!("f2f2f2".parse::<BackgroundColor>().unwrap().rgb(), [242, 242, 242]);
        assert_eq!("#0af".parse::<BackgroundColor>().unwrap().rgb(), [0, 170, 255]);
        assert!("#12345".parse::<BackgroundColor>().is_err());
        assert!("#gggggg".parse::<BackgroundColor>().is_err());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = HarmonizeConfig::default();
        config.canvas.width = 0;
        assert!(matches!(config.validate(), Err(HarmonizeError::Configuration(_))));

        let mut config = HarmonizeConfig::default();
        config.shadow_opacity = 1.5;
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("shadow opacity"));

        let mut config = HarmonizeConfig::default();
        config.output_quality = 101;
        assert!(config.validate().is_err());

        assert!(HarmonizeConfig::builder().max_concurrent(0).build().is_err());
    }

    #[test]
    fn test_quality_ignored_for_lossless_formats() {
        assert!(!HarmonizeConfig::default().quality_ignored());

        let webp = HarmonizeConfig::builder().output_quality(60).build().unwrap();
        assert_eq!(webp.output_format, OutputFormat::WebP);
        assert!(webp.quality_ignored());

        let jpeg = HarmonizeConfig::builder()
            .output_format(OutputFormat::Jpeg)
            .output_quality(60)
            .build()
            .unwrap();
        assert!(!jpeg.quality_ignored());
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = HarmonizeConfig::builder().output_quality(150).build().unwrap();
        assert_eq!(config.output_quality, 100);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CANVAS_WIDTH", "1000"),
            ("CANVAS_HEIGHT", "1250"),
            ("BACKGROUND_COLOR", "#ffffff"),
            ("WEBP_QUALITY", "80"),
            ("DRY_RUN", "true"),
            ("MAX_CONCURRENT_PROCESSES", "2"),
            ("ENABLE_AUTO_TRIM", "false"),
        ]
        .into_iter()
        .collect();

        let config =
            HarmonizeConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.canvas.width, 1000);
        assert_eq!(config.canvas.height, 1250);
        assert_eq!(config.canvas.background_color.rgb(), [255, 255, 255]);
        assert_eq!(config.output_quality, 80);
        assert!(config.dry_run);
        assert_eq!(config.max_concurrent, 2);
        assert!(!config.enable_auto_trim);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let result = HarmonizeConfig::from_lookup(|key| {
            (key == "CANVAS_WIDTH").then(|| "wide".to_string())
        });
        assert!(matches!(result, Err(HarmonizeError::Configuration(_))));
    }

    #[test]
    fn test_config_serde_round_trip_uses_hex_color() {
        let config = HarmonizeConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["canvas"]["backgroundColor"], "#f3f3f4");

        let partial: HarmonizeConfig =
            serde_json::from_str(r##"{"canvas":{"width":800,"height":1000,"backgroundColor":"#000"}}"##)
                .unwrap();
        assert_eq!(partial.canvas.width, 800);
        assert_eq!(partial.max_concurrent, 5);
    }
}
