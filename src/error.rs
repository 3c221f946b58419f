//! Error types for catalog harmonization

use thiserror::Error;

/// Result type alias for harmonization operations
pub type Result<T> = std::result::Result<T, HarmonizeError>;

/// Error taxonomy for the harmonization pipeline
///
/// Image-level variants (`InvalidDimensions`, `Download`, `Upload`, `Image`) are
/// caught per image by the batch orchestrator. `Segmentation` and `EmptyResult`
/// never leave the background remover. `ProductProcessing` is recorded as a
/// failed status and then surfaced to batch accounting. `Configuration` aborts
/// a run before any product is touched.
#[derive(Error, Debug)]
pub enum HarmonizeError {
    /// Malformed or zero-size source image
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Source image could not be fetched
    #[error("Failed to download '{url}': {message}")]
    Download { url: String, message: String },

    /// Processed image could not be stored by the product repository
    #[error("Failed to upload image for product {product_id}: {message}")]
    Upload { product_id: String, message: String },

    /// Primary background removal attempt failed (timeout, crash, model error)
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// Trimming collapsed the matte to nothing
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Unrecovered failure while processing a single product
    #[error("Product {product_id} failed: {source}")]
    ProductProcessing {
        product_id: String,
        #[source]
        source: Box<HarmonizeError>,
    },

    /// Missing or invalid run configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Status store read or write failure
    #[error("Status store error: {0}")]
    StatusStore(String),

    /// Unsupported output format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Status record (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarmonizeError {
    /// Create a new invalid dimensions error
    #[must_use]
    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Create a new download error
    pub fn download<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new upload error
    pub fn upload<P: Into<String>, M: Into<String>>(product_id: P, message: M) -> Self {
        Self::Upload {
            product_id: product_id.into(),
            message: message.into(),
        }
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new empty result error
    pub fn empty_result<S: Into<String>>(msg: S) -> Self {
        Self::EmptyResult(msg.into())
    }

    /// Wrap an error raised while processing a product
    pub fn product_processing<P: Into<String>>(product_id: P, source: HarmonizeError) -> Self {
        Self::ProductProcessing {
            product_id: product_id.into(),
            source: Box::new(source),
        }
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new status store error
    pub fn status_store<S: Into<String>>(msg: S) -> Self {
        Self::StatusStore(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::Configuration(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Whether this error is scoped to a single image and must not abort its product
    #[must_use]
    pub fn is_image_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidDimensions { .. }
                | Self::Download { .. }
                | Self::Upload { .. }
                | Self::Image(_)
                | Self::UnsupportedFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let err = HarmonizeError::invalid_dimensions(0, 400);
        assert_eq!(err.to_string(), "Invalid image dimensions: 0x400");

        let err = HarmonizeError::configuration("SHOPIFY_STORE_URL is required");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: SHOPIFY_STORE_URL is required"
        );
    }

    #[test]
    fn test_product_processing_keeps_source() {
        let inner = HarmonizeError::status_store("write rejected");
        let err = HarmonizeError::product_processing("42", inner);

        let message = err.to_string();
        assert!(message.contains("42"));
        assert!(message.contains("write rejected"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_image_level_classification() {
        assert!(HarmonizeError::invalid_dimensions(0, 0).is_image_level());
        assert!(HarmonizeError::download("https://cdn/x.jpg", "404").is_image_level());
        assert!(HarmonizeError::upload("1", "rate limited").is_image_level());
        assert!(!HarmonizeError::configuration("missing token").is_image_level());
        assert!(!HarmonizeError::status_store("offline").is_image_level());
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = HarmonizeError::file_io_error("write status file", Path::new("/var/state.json"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write status file"));
        assert!(error_string.contains("/var/state.json"));

        let err = HarmonizeError::config_value_error("shadow opacity", 1.5, "0-1", Some(0.18));
        let error_string = err.to_string();
        assert!(error_string.contains("shadow opacity"));
        assert!(error_string.contains("1.5"));
        assert!(error_string.contains("Recommended: 0.18"));
    }
}
