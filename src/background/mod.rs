//! Background removal with an ordered fallback chain

pub mod remover;
pub mod strategies;
pub mod trim;

pub use remover::{BackgroundRemover, Removal};
pub use strategies::{
    AlphaTrimStrategy, OriginalWithAlphaStrategy, RemovalInput, RemovalStrategy,
    SegmentationStrategy, ThresholdTrimStrategy,
};
pub use trim::{auto_trim_borders, trim_alpha, BorderColor, Bounds};
