//! Catalog harmonization CLI
//!
//! Runs the batch over a directory catalog and exposes the operator actions
//! on the status store.

use super::config::CliConfigBuilder;
use super::progress::IndicatifProgressReporter;
use crate::{
    batch::{
        BatchOptions, BatchOrchestrator, DirectoryRepository, JsonFileStatusStore, ProductRepository,
        RunSummary, StatusStatistics, StatusTracker,
    },
    pipeline::HarmonizationPipeline,
    services::ProgressTracker,
    tracing_config::{init_cli_tracing, TracingFormat},
    types::ProcessingStatus,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Harmonize catalog product photos onto a uniform canvas
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "catalog-harmonize")]
pub struct Cli {
    /// Verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Console, global = true)]
    pub log_format: LogFormat,

    /// Status file [default: $HARMONIZE_STATUS_FILE or the user data directory]
    #[arg(long, value_name = "PATH", global = true)]
    pub status_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Harmonize every product that is not completed or skipped
    Run(RunArgs),
    /// Print per-status counts for the catalog
    Stats(CatalogArgs),
    /// List products currently in a status
    List(ListArgs),
    /// Exclude a product from future runs
    Skip(SkipArgs),
    /// Make a product eligible again
    Reset(ProductArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Catalog root: one subdirectory per product
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,
}

#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Directory receiving harmonized images
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Only consider the first N products
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Run the pipeline without writing or deleting images
    #[arg(long)]
    pub dry_run: bool,

    /// Delete source images once their replacement is written
    #[arg(long)]
    pub remove_originals: bool,

    #[arg(long)]
    pub canvas_width: Option<u32>,

    #[arg(long)]
    pub canvas_height: Option<u32>,

    /// Canvas color as hex (e.g. "#f3f3f4")
    #[arg(long)]
    pub background_color: Option<String>,

    /// Contact shadow opacity (0-1)
    #[arg(long)]
    pub shadow_opacity: Option<f32>,

    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// Encoder quality (0-100, JPEG only)
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Products processed concurrently per chunk
    #[arg(short = 'c', long)]
    pub max_concurrent: Option<usize>,

    /// Pause between chunks in milliseconds
    #[arg(long)]
    pub chunk_delay_ms: Option<u64>,

    #[arg(long)]
    pub no_auto_trim: bool,

    /// Skip segmentation and go straight to the fallback strategies
    #[arg(long)]
    pub no_background_removal: bool,

    /// Segmentation helper, invoked as `<program> [args..] <input> <output>`
    #[arg(long, value_name = "PROGRAM")]
    pub segmenter: Option<PathBuf>,

    /// Extra argument passed to the segmentation helper before the file paths
    #[arg(long = "segmenter-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub segmenter_args: Vec<String>,

    /// Concurrent segmentation invocations [default: max concurrent]
    #[arg(long)]
    pub segmenter_concurrency: Option<usize>,

    /// Seconds before a segmentation invocation is abandoned
    #[arg(long)]
    pub segmentation_timeout: Option<u64>,

    /// Exit with a non-zero status if any product failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Show a progress bar instead of per-product log lines
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// pending, in_progress, completed, failed or skipped
    #[arg(short, long, default_value = "pending")]
    pub status: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProductArgs {
    /// Product id (the catalog directory name)
    #[arg(value_name = "PRODUCT")]
    pub product: String,
}

#[derive(Args, Debug, Clone)]
pub struct SkipArgs {
    #[command(flatten)]
    pub product: ProductArgs,

    #[arg(short, long, default_value = "Skipped by operator")]
    pub reason: String,

    /// Title stored with the record
    #[arg(short, long)]
    pub title: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Webp,
    Jpeg,
    Png,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Console => TracingFormat::Console,
            LogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => TracingFormat::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing")?;

    let status_path = CliConfigBuilder::status_path(cli.status_file.as_deref())
        .context("Failed to resolve status file")?;
    info!("Status file: {}", status_path.display());
    let tracker = StatusTracker::new(Arc::new(JsonFileStatusStore::new(&status_path)));

    match cli.command {
        Command::Run(args) => run(&args, &status_path).await,
        Command::Stats(args) => {
            let products = list_catalog(&args.input).await?;
            let stats = tracker.statistics(&products).await;
            print_statistics(&stats);
            Ok(())
        },
        Command::List(args) => {
            let status: ProcessingStatus = args.status.parse().context("Invalid --status")?;
            let products = list_catalog(&args.catalog.input).await?;
            for product in tracker.products_by_status(&products, status).await {
                println!("{}\t{}", product.id, product.title);
            }
            Ok(())
        },
        Command::Skip(args) => {
            let id = &args.product.product;
            let title = match args.title {
                Some(title) => title,
                None => tracker
                    .record(id)
                    .await?
                    .map(|record| record.product_title)
                    .unwrap_or_default(),
            };
            tracker.mark_skipped(id, &title, &args.reason).await?;
            println!("Skipped {}", id);
            Ok(())
        },
        Command::Reset(args) => {
            tracker.reset(&args.product).await?;
            println!("Reset {}", args.product);
            Ok(())
        },
    }
}

async fn run(args: &RunArgs, status_path: &std::path::Path) -> Result<()> {
    let config = CliConfigBuilder::from_run_args(args).context("Invalid configuration")?;
    let capability = CliConfigBuilder::segmenter(args, &config);

    info!(
        "Canvas {}x{} {}, format {:?}, max concurrent {}, dry run {}",
        config.canvas.width,
        config.canvas.height,
        config.canvas.background_color,
        config.output_format,
        config.max_concurrent,
        config.dry_run
    );
    if capability.is_none() && config.enable_background_removal {
        warn!("No segmentation helper configured, using fallback strategies only");
    }

    let pipeline = Arc::new(HarmonizationPipeline::new(config, capability)?);
    let repository = Arc::new(
        DirectoryRepository::new(&args.catalog.input, &args.output)?
            .remove_originals(args.remove_originals),
    );
    let store = Arc::new(JsonFileStatusStore::new(status_path));

    let progress = if args.progress {
        ProgressTracker::new(Arc::new(IndicatifProgressReporter::new()))
    } else {
        ProgressTracker::console(false)
    };

    let orchestrator = BatchOrchestrator::new(pipeline, repository, store).with_progress(progress);
    let summary = orchestrator
        .run(BatchOptions { limit: args.limit })
        .await
        .context("Batch run failed")?;

    report(&summary);

    if args.fail_on_error && summary.batch.failed > 0 {
        anyhow::bail!("{} product(s) failed", summary.batch.failed);
    }
    Ok(())
}

async fn list_catalog(input: &std::path::Path) -> Result<Vec<crate::types::Product>> {
    let repository = DirectoryRepository::new(input, input)?;
    repository
        .list_all()
        .await
        .with_context(|| format!("Failed to list catalog at {}", input.display()))
}

fn report(summary: &RunSummary) {
    let batch = &summary.batch;
    println!(
        "Listed {} products, {} selected, {} already done",
        summary.listed,
        batch.selected(),
        batch.excluded
    );
    println!(
        "Batch complete: {} succeeded, {} failed in {:.2}s",
        batch.succeeded,
        batch.failed,
        batch.elapsed.as_secs_f64()
    );
    for failure in batch.failures() {
        if let Err(e) = &failure.result {
            println!("  ✗ {} ({}): {}", failure.title, failure.product_id, e);
        }
    }
    print_statistics(&summary.statistics);
}

fn print_statistics(stats: &StatusStatistics) {
    let rule = "=".repeat(60);
    println!("{}", rule);
    println!("HARMONIZATION STATISTICS");
    println!("{}", rule);
    println!("Total products:  {}", stats.total);
    println!(
        "Completed:       {} ({}%)",
        stats.completed,
        percentage(stats.completed, stats.total)
    );
    println!("In progress:     {}", stats.in_progress);
    println!("Failed:          {}", stats.failed);
    println!("Skipped:         {}", stats.skipped);
    println!("Pending:         {}", stats.pending);
    println!("{}", rule);
}

fn percentage(value: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", value as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), "0.0");
        assert_eq!(percentage(1, 3), "33.3");
        assert_eq!(percentage(4, 4), "100.0");
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "catalog-harmonize",
            "-v",
            "run",
            "--input",
            "catalog",
            "--output",
            "out",
            "--limit",
            "10",
            "--format",
            "jpeg",
            "--segmenter",
            "python3",
            "--segmenter-arg",
            "remove_bg.py",
            "--fail-on-error",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.limit, Some(10));
        assert_eq!(args.format, Some(CliOutputFormat::Jpeg));
        assert_eq!(args.segmenter_args, vec!["remove_bg.py".to_string()]);
        assert!(args.fail_on_error);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_operator_commands() {
        let cli = Cli::try_parse_from([
            "catalog-harmonize",
            "skip",
            "vase-01",
            "--reason",
            "studio shot",
            "--status-file",
            "state.json",
        ])
        .unwrap();
        assert_eq!(cli.status_file, Some(PathBuf::from("state.json")));
        let Command::Skip(args) = cli.command else {
            panic!("expected skip command");
        };
        assert_eq!(args.product.product, "vase-01");
        assert_eq!(args.reason, "studio shot");

        assert!(Cli::try_parse_from(["catalog-harmonize", "reset"]).is_err());
    }
}
