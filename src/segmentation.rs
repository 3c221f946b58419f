//! Segmentation capability abstraction
//!
//! The model that separates a product from its background is consumed as an
//! opaque capability. Implementations must fail loudly rather than return a
//! garbage matte; the background remover treats any error as a primary-step
//! failure and falls back.

use crate::error::{HarmonizeError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument, warn};

/// Opaque foreground segmentation
#[async_trait]
pub trait SegmentationCapability: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &str;

    /// Produce an alpha-matted image from an encoded input image
    ///
    /// # Errors
    /// - Capability crashed, timed out or produced no output
    async fn run(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Like [`run`](Self::run), failing if the invocation exceeds `limit`
    ///
    /// The clock covers the invocation only. Wrappers that queue callers
    /// override this and start the timer once the call is admitted.
    ///
    /// # Errors
    /// - `Segmentation` on timeout, plus everything `run` returns
    async fn run_within(&self, input: &[u8], limit: Duration) -> Result<Vec<u8>> {
        tokio::time::timeout(limit, self.run(input))
            .await
            .map_err(|_| {
                HarmonizeError::segmentation(format!(
                    "{} timed out after {}s",
                    self.name(),
                    limit.as_secs_f32()
                ))
            })?
    }
}

#[async_trait]
impl<T: SegmentationCapability + ?Sized> SegmentationCapability for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, input: &[u8]) -> Result<Vec<u8>> {
        (**self).run(input).await
    }

    async fn run_within(&self, input: &[u8], limit: Duration) -> Result<Vec<u8>> {
        (**self).run_within(input, limit).await
    }
}

/// Out-of-process segmentation helper invoked as `<program> [args..] <input> <output>`
///
/// Every invocation writes its input to a uniquely named temporary file and
/// reads the matte from a second one. Both are removed when the invocation
/// ends, whatever the outcome. The child is killed if the invocation future
/// is dropped (e.g. on timeout).
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: OsString,
    args: Vec<OsString>,
    temp_dir: Option<PathBuf>,
    label: String,
}

impl CommandSegmenter {
    pub fn new<P: Into<OsString>>(program: P) -> Self {
        let program = program.into();
        let label = PathBuf::from(&program)
            .file_name()
            .map_or_else(|| "command".to_string(), |name| name.to_string_lossy().into_owned());
        Self {
            program,
            args: Vec::new(),
            temp_dir: None,
            label,
        }
    }

    /// Arguments placed before the input and output paths (e.g. a script path)
    #[must_use]
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory for the temporary input/output files (system temp dir otherwise)
    #[must_use]
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn temp_path(&self, prefix: &str) -> Result<tempfile::TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(".png");
        let file = match &self.temp_dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .map_err(|e| HarmonizeError::file_io_error("create temp file in", dir, &e))?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl SegmentationCapability for CommandSegmenter {
    fn name(&self) -> &str {
        &self.label
    }

    #[instrument(skip(self, input), fields(program = %self.label, input_bytes = input.len()))]
    async fn run(&self, input: &[u8]) -> Result<Vec<u8>> {
        // TempPath removes the file on drop and ignores removal errors
        let input_path = self.temp_path("harmonize-in-")?;
        let output_path = self.temp_path("harmonize-out-")?;

        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| HarmonizeError::file_io_error("write segmentation input", &input_path, &e))?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&*input_path)
            .arg(&*output_path)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                HarmonizeError::segmentation(format!("Failed to start {}: {}", self.label, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "Segmentation helper failed");
            return Err(HarmonizeError::segmentation(format!(
                "{} exited with {}",
                self.label, output.status
            )));
        }

        let matte = tokio::fs::read(&output_path).await.map_err(|e| {
            HarmonizeError::segmentation(format!("{} produced no output: {}", self.label, e))
        })?;

        if matte.is_empty() {
            return Err(HarmonizeError::segmentation(format!(
                "{} produced an empty output file",
                self.label
            )));
        }

        debug!(output_bytes = matte.len(), "Segmentation helper finished");
        Ok(matte)
    }
}

/// Bounds the number of concurrent invocations of a shared capability
///
/// Size the guard to 1 for capabilities that are not safe for concurrent use.
pub struct GuardedSegmenter<S> {
    inner: S,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl<S: SegmentationCapability> GuardedSegmenter<S> {
    pub fn new(inner: S, max_concurrent: usize) -> Self {
        let limit = max_concurrent.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    async fn admit(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| HarmonizeError::segmentation("Segmentation guard closed"))
    }
}

impl<S> std::fmt::Debug for GuardedSegmenter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedSegmenter")
            .field("limit", &self.limit)
            .field("available", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: SegmentationCapability> SegmentationCapability for GuardedSegmenter<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, input: &[u8]) -> Result<Vec<u8>> {
        let _permit = self.admit().await?;
        self.inner.run(input).await
    }

    async fn run_within(&self, input: &[u8], limit: Duration) -> Result<Vec<u8>> {
        let _permit = self.admit().await?;
        self.inner.run_within(input, limit).await
    }
}
