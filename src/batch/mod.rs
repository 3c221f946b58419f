//! Catalog-level processing: repository access, status tracking and the batch orchestrator

pub mod orchestrator;
pub mod repository;
pub mod status;

pub use orchestrator::{
    BatchOptions, BatchOrchestrator, BatchResult, ProductOutcome, ProductSummary, RunSummary,
};
pub use repository::{DirectoryRepository, ProductRepository};
pub use status::{
    InMemoryStatusStore, JsonFileStatusStore, StatusStatistics, StatusStore, StatusTracker,
};
