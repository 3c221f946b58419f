//! Core data model shared by the layout engine, the pipeline and the batch orchestrator

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

/// Shape/content class driving scaling and shadow rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Height more than twice the width (bottles, vases)
    TallThin,
    /// Width more than 1.5x the height (banners, prints)
    Wide,
    /// Small items or accessories detected by size or keyword
    SmallAccessory,
    /// Everything else
    Default,
}

impl Category {
    /// Stable identifier used in status records and logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TallThin => "tall_thin",
            Self::Wide => "wide",
            Self::SmallAccessory => "small_accessory",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Category decision with a human-readable justification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    pub category: Category,
    pub reason: String,
}

/// Target product size on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledDimensions {
    pub width: u32,
    pub height: u32,
    /// Always `width / original.width`
    pub scale_factor: f64,
    /// Set only for the default category when the uncapped factor exceeded the maximum upscale
    pub capped_at_max: bool,
}

/// Complete scaling decision for one image, immutable once computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingInfo {
    pub original: Dimensions,
    pub category: Category,
    pub reason: String,
    pub scaled: ScaledDimensions,
    pub canvas: Dimensions,
    /// Original aspect ratio rounded to three decimals
    pub aspect_ratio: f64,
}

impl ScalingInfo {
    /// Top-left offset that centers the scaled product on the canvas
    #[must_use]
    pub fn center_offset(&self) -> (u32, u32) {
        (
            center_offset(self.canvas.width, self.scaled.width),
            center_offset(self.canvas.height, self.scaled.height),
        )
    }
}

pub(crate) fn center_offset(outer: u32, inner: u32) -> u32 {
    (f64::from(outer.saturating_sub(inner)) / 2.0).round() as u32
}

/// Elliptical contact shadow in canvas coordinates
///
/// `x` is the left edge of the ellipse's bounding box, `y` is the vertical
/// center of the ellipse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowSpec {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
    pub rx: u32,
    pub ry: u32,
}

/// Read-only product metadata used for categorization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductContext {
    pub title: String,
    #[serde(rename = "type")]
    pub product_type: String,
}

impl ProductContext {
    pub fn new<T: Into<String>, P: Into<String>>(title: T, product_type: P) -> Self {
        Self {
            title: title.into(),
            product_type: product_type.into(),
        }
    }
}

/// Decoded source image, owned by one pipeline invocation
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    pub dimensions: Dimensions,
    pub format: Option<ImageFormat>,
    pub byte_len: usize,
}

/// Per-stage timings for one image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub background_removal_ms: u64,
    pub compositing_ms: u64,
    pub total_ms: u64,
}

/// Output of the full harmonization pipeline for one image
#[derive(Debug, Clone)]
pub struct HarmonizedImage {
    /// Encoded canvas in the configured output format
    pub buffer: Vec<u8>,
    pub scaling_info: ScalingInfo,
    pub shadow: ShadowSpec,
    /// Name of the background removal strategy that produced the foreground
    pub removal_strategy: String,
    pub timings: ProcessingTimings,
}

/// One image attached to a catalog product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: String,
    pub url: String,
}

/// Catalog product as listed by the product repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub product_type: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl Product {
    #[must_use]
    pub fn context(&self) -> ProductContext {
        ProductContext::new(self.title.clone(), self.product_type.clone())
    }

    /// Slug used for uploaded filenames, falling back to the product id
    #[must_use]
    pub fn slug(&self) -> &str {
        self.handle
            .as_deref()
            .filter(|handle| !handle.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Processing status of a product
///
/// `Pending` is implicit (no record) except after an explicit reset.
/// `Skipped` is only ever set by an operator, never by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl ProcessingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether a product in this status is selected for the next batch
    #[must_use]
    pub fn needs_processing(self) -> bool {
        !matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = crate::error::HarmonizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(crate::error::HarmonizeError::configuration(format!(
                "Unknown processing status '{}'",
                other
            ))),
        }
    }
}

/// Descriptor of one successfully harmonized image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    pub original_id: String,
    pub category: Category,
    pub dimensions: ScaledDimensions,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_id: Option<String>,
}

/// Externally persisted per-product processing state
///
/// One record per product, overwritten on every status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRecord {
    pub status: ProcessingStatus,
    #[serde(default)]
    pub product_title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processed_images: Vec<ProcessedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaled_dimensions: Option<ScaledDimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProcessingRecord {
    /// Bare record with only a status and title set
    pub fn new<T: Into<String>>(status: ProcessingStatus, product_title: T) -> Self {
        Self {
            status,
            product_title: product_title.into(),
            processed_images: Vec::new(),
            category: None,
            scaled_dimensions: None,
            started_at: None,
            processed_at: None,
            failed_at: None,
            skipped_at: None,
            reset_at: None,
            error: None,
            reason: None,
        }
    }

    #[must_use]
    pub fn in_progress(product_title: &str) -> Self {
        let mut record = Self::new(ProcessingStatus::InProgress, product_title);
        record.started_at = Some(Utc::now());
        record
    }

    /// Completed record; category and dimensions come from the first processed image
    #[must_use]
    pub fn completed(product_title: &str, processed_images: Vec<ProcessedImage>) -> Self {
        let mut record = Self::new(ProcessingStatus::Completed, product_title);
        record.processed_at = Some(Utc::now());
        record.category = Some(
            processed_images
                .first()
                .map_or_else(|| "unknown".to_string(), |image| image.category.to_string()),
        );
        record.scaled_dimensions = processed_images.first().map(|image| image.dimensions);
        record.processed_images = processed_images;
        record
    }

    /// Completed record for a product that has no images at all
    #[must_use]
    pub fn completed_without_images(product_title: &str) -> Self {
        let mut record = Self::new(ProcessingStatus::Completed, product_title);
        record.processed_at = Some(Utc::now());
        record.category = Some("no_images".to_string());
        record
    }

    #[must_use]
    pub fn failed(product_title: &str, error: &str) -> Self {
        let mut record = Self::new(ProcessingStatus::Failed, product_title);
        record.failed_at = Some(Utc::now());
        record.error = Some(error.to_string());
        record
    }

    #[must_use]
    pub fn skipped(product_title: &str, reason: &str) -> Self {
        let mut record = Self::new(ProcessingStatus::Skipped, product_title);
        record.skipped_at = Some(Utc::now());
        record.reason = Some(reason.to_string());
        record
    }

    #[must_use]
    pub fn reset() -> Self {
        let mut record = Self::new(ProcessingStatus::Pending, "");
        record.reset_at = Some(Utc::now());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed(category: Category) -> ProcessedImage {
        ProcessedImage {
            original_id: "img-1".to_string(),
            category,
            dimensions: ScaledDimensions {
                width: 886,
                height: 2125,
                scale_factor: 0.886,
                capped_at_max: false,
            },
            processed_at: Utc::now(),
            uploaded_id: None,
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessingStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let status: ProcessingStatus = serde_json::from_str("\"skipped\"").unwrap();
        assert_eq!(status, ProcessingStatus::Skipped);
    }

    #[test]
    fn test_needs_processing() {
        assert!(ProcessingStatus::Pending.needs_processing());
        assert!(ProcessingStatus::InProgress.needs_processing());
        assert!(ProcessingStatus::Failed.needs_processing());
        assert!(!ProcessingStatus::Completed.needs_processing());
        assert!(!ProcessingStatus::Skipped.needs_processing());
    }

    #[test]
    fn test_completed_record_uses_first_image() {
        let record = ProcessingRecord::completed(
            "Vase",
            vec![processed(Category::TallThin), processed(Category::Default)],
        );
        assert_eq!(record.status, ProcessingStatus::Completed);
        assert_eq!(record.category.as_deref(), Some("tall_thin"));
        assert_eq!(record.scaled_dimensions.map(|d| d.height), Some(2125));
        assert!(record.processed_at.is_some());

        let empty = ProcessingRecord::completed("Vase", Vec::new());
        assert_eq!(empty.category.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_record_json_shape() {
        let record = ProcessingRecord::failed("Mug", "download timed out");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["productTitle"], "Mug");
        assert_eq!(value["error"], "download timed out");
        assert!(value.get("processedImages").is_none());

        let parsed: ProcessingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_product_slug_falls_back_to_id() {
        let mut product = Product {
            id: "123".to_string(),
            title: "Enamel Pin".to_string(),
            ..Product::default()
        };
        assert_eq!(product.slug(), "123");

        product.handle = Some("enamel-pin".to_string());
        assert_eq!(product.slug(), "enamel-pin");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("completed".parse::<ProcessingStatus>().unwrap(), ProcessingStatus::Completed);
        assert_eq!("In_Progress".parse::<ProcessingStatus>().unwrap(), ProcessingStatus::InProgress);
        assert!("done".parse::<ProcessingStatus>().is_err());
    }
}
