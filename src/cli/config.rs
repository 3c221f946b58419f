//! Conversion of CLI arguments into library configuration
//!
//! Precedence: command-line flag, then environment variable, then default.

use crate::cli::main_impl::{CliOutputFormat, RunArgs};
use crate::{
    config::{HarmonizeConfig, OutputFormat},
    segmentation::{CommandSegmenter, GuardedSegmenter, SegmentationCapability},
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STATUS_FILE_ENV: &str = "HARMONIZE_STATUS_FILE";
const SEGMENTER_ENV: &str = "HARMONIZE_SEGMENTER";

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Environment configuration with run flags applied on top
    pub(crate) fn from_run_args(args: &RunArgs) -> Result<HarmonizeConfig> {
        let base = HarmonizeConfig::from_env().context("Invalid environment configuration")?;
        Self::apply(base, args)
    }

    pub(crate) fn apply(mut config: HarmonizeConfig, args: &RunArgs) -> Result<HarmonizeConfig> {
        if let Some(width) = args.canvas_width {
            config.canvas.width = width;
        }
        if let Some(height) = args.canvas_height {
            config.canvas.height = height;
        }
        if let Some(color) = &args.background_color {
            config.canvas.background_color = color
                .parse()
                .with_context(|| format!("Invalid background color '{}'", color))?;
        }
        if let Some(opacity) = args.shadow_opacity {
            config.shadow_opacity = opacity;
        }
        if let Some(format) = args.format {
            config.output_format = match format {
                CliOutputFormat::Webp => OutputFormat::WebP,
                CliOutputFormat::Jpeg => OutputFormat::Jpeg,
                CliOutputFormat::Png => OutputFormat::Png,
            };
        }
        if let Some(quality) = args.quality {
            config.output_quality = quality;
        }
        if let Some(max_concurrent) = args.max_concurrent {
            config.max_concurrent = max_concurrent;
        }
        if let Some(delay) = args.chunk_delay_ms {
            config.chunk_delay_ms = delay;
        }
        if let Some(timeout) = args.segmentation_timeout {
            config.segmentation_timeout_secs = timeout;
        }
        if args.dry_run {
            config.dry_run = true;
        }
        if args.no_auto_trim {
            config.enable_auto_trim = false;
        }
        if args.no_background_removal {
            config.enable_background_removal = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Segmentation helper from `--segmenter` or `HARMONIZE_SEGMENTER`
    pub(crate) fn segmenter(
        args: &RunArgs,
        config: &HarmonizeConfig,
    ) -> Option<Arc<dyn SegmentationCapability>> {
        if !config.enable_background_removal {
            return None;
        }

        let program = args
            .segmenter
            .clone()
            .or_else(|| std::env::var_os(SEGMENTER_ENV).map(PathBuf::from))?;
        let limit = args.segmenter_concurrency.unwrap_or(config.max_concurrent);
        let command = CommandSegmenter::new(program).with_args(args.segmenter_args.iter());

        Some(Arc::new(GuardedSegmenter::new(command, limit)))
    }

    /// `--status-file`, then `HARMONIZE_STATUS_FILE`, then the user data directory
    pub(crate) fn status_path(flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(STATUS_FILE_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(dirs::data_dir()
            .context("Failed to determine data directory. Set HARMONIZE_STATUS_FILE or pass --status-file.")?
            .join("catalog-harmonize")
            .join("status.json"))
    }
}
