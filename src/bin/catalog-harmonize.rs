//! Catalog harmonization CLI
//!
//! Command-line entry point for the catalog-harmonize library.

#[cfg(feature = "cli")]
use catalog_harmonize::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
