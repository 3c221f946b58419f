//! Output format handling service
//!
//! Encoding of mattes and finished canvases lives here so the pipeline
//! stages only deal with decoded rasters.

use crate::{
    config::OutputFormat,
    error::{HarmonizeError, Result},
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Service for encoding rasters into output formats
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an image in the given format
    ///
    /// `quality` applies to JPEG only; WebP is written losslessly and PNG is
    /// always lossless.
    ///
    /// # Examples
    /// ```rust
    /// use catalog_harmonize::{services::OutputFormatHandler, OutputFormat};
    /// use image::{DynamicImage, RgbImage};
    ///
    /// let canvas = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
    /// let bytes = OutputFormatHandler::encode(&canvas, OutputFormat::Png, 90).unwrap();
    /// assert!(!bytes.is_empty());
    /// ```
    pub fn encode(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            OutputFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.min(100));
                encoder.encode_image(&rgb_image).map_err(|e| {
                    HarmonizeError::internal(format!("Failed to encode JPEG: {}", e))
                })?;
            },
            OutputFormat::Png | OutputFormat::WebP => {
                let image_format = Self::image_format(format);
                image.write_to(&mut cursor, image_format).map_err(|e| match e {
                    image::ImageError::Unsupported(_) => {
                        HarmonizeError::unsupported_format(Self::get_extension(format))
                    },
                    other => HarmonizeError::Image(other),
                })?;
            },
        }

        Ok(buffer)
    }

    /// Encode a matte as PNG, preserving its alpha channel
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    /// File extension without the dot
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Whether the encoder honors the quality setting
    #[must_use]
    pub fn uses_quality(format: OutputFormat) -> bool {
        matches!(format, OutputFormat::Jpeg)
    }
}
