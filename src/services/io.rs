//! Image I/O operations service
//!
//! Decoding and validation of source images, kept apart from the pipeline
//! stages so they can be exercised on their own.

use crate::{
    error::{HarmonizeError, Result},
    types::{Dimensions, SourceImage},
};
use image::DynamicImage;
use std::path::Path;

/// Service for loading and inspecting source images
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an encoded source image and validate its dimensions
    ///
    /// # Errors
    /// - `Image` when the bytes are not a decodable image
    /// - `InvalidDimensions` for zero-size images
    ///
    /// # Examples
    /// ```rust,no_run
    /// use catalog_harmonize::services::ImageIOService;
    ///
    /// let bytes = std::fs::read("product.jpg")?;
    /// let source = ImageIOService::decode(&bytes)?;
    /// println!("{}", source.dimensions);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<SourceImage> {
        if bytes.is_empty() {
            return Err(HarmonizeError::invalid_dimensions(0, 0));
        }

        let format = image::guess_format(bytes).ok();
        let image = image::load_from_memory(bytes)?;
        let dimensions = Dimensions::new(image.width(), image.height());

        if dimensions.width == 0 || dimensions.height == 0 {
            return Err(HarmonizeError::invalid_dimensions(
                dimensions.width,
                dimensions.height,
            ));
        }

        log::debug!(
            "Decoded {:?} source image {} ({} bytes)",
            format,
            dimensions,
            bytes.len()
        );

        Ok(SourceImage {
            image,
            dimensions,
            format,
            byte_len: bytes.len(),
        })
    }

    /// Read and decode an image file
    pub async fn load_image<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path_ref = path.as_ref();
        let bytes = tokio::fs::read(path_ref)
            .await
            .map_err(|e| HarmonizeError::file_io_error("read image file", path_ref, &e))?;
        Self::decode(&bytes)
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif"
                )
            })
    }

    /// Whether the image carries at least one non-opaque pixel
    #[must_use]
    pub fn has_transparency(image: &DynamicImage) -> bool {
        if !image.color().has_alpha() {
            return false;
        }
        image.to_rgba8().pixels().any(|pixel| pixel[3] < u8::MAX)
    }
}
