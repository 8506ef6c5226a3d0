//! Batch extraction: many statement files → one ordered transaction list.
//!
//! Files are processed strictly one after another. File *i* is rasterised,
//! extracted and parsed (or fails) before file *i + 1* is read, which keeps
//! the load on the extraction service to one request at a time and makes
//! progress events deterministic.
//!
//! A failing file never stops the batch. Its error is recorded on its
//! [`FileResult`] and the next file starts. Only a batch that ends with no
//! transactions at all is an error ([`FintracksError::EmptyExtraction`]).
//!
//! Use [`crate::stream::extract_stream`] to receive each file's result as
//! soon as it is ready.

use crate::config::ExtractionConfig;
use crate::error::{FileError, FintracksError};
use crate::pipeline::input::{self, StatementFile};
use crate::pipeline::llm::{self, Extractor, VisionExtractor};
use crate::pipeline::parse::parse_transactions;
use crate::pipeline::rasterize::{DocumentRasterizer, Rasterizer};
use crate::progress::ProgressCallback;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// How one file fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    /// At least one transaction was extracted.
    Extracted,
    /// The service answered, but no usable row came back.
    NoRecords,
    /// Not an image or PDF; skipped without calling the service.
    Unsupported,
    /// Rasterisation or extraction failed; see [`FileResult::error`].
    Failed,
}

/// Outcome for a single submitted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// 1-indexed position in the submission.
    pub index: usize,
    pub name: String,
    pub status: FileStatus,
    /// Parsed rows, in source line order.
    pub records: Vec<Transaction>,
    /// Number of images sent to the extraction service.
    pub page_images: usize,
    pub duration_ms: u64,
    pub error: Option<FileError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_files: usize,
    pub extracted_files: usize,
    pub empty_files: usize,
    pub unsupported_files: usize,
    pub failed_files: usize,
    pub total_records: usize,
    pub total_duration_ms: u64,
}

impl BatchStats {
    fn from_files(files: &[FileResult], total_duration_ms: u64) -> Self {
        let count = |s: FileStatus| files.iter().filter(|f| f.status == s).count();
        Self {
            total_files: files.len(),
            extracted_files: count(FileStatus::Extracted),
            empty_files: count(FileStatus::NoRecords),
            unsupported_files: count(FileStatus::Unsupported),
            failed_files: count(FileStatus::Failed),
            total_records: files.iter().map(|f| f.records.len()).sum(),
            total_duration_ms,
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    /// All records, in submission order, then source line order.
    pub transactions: Vec<Transaction>,
    pub files: Vec<FileResult>,
    pub stats: BatchStats,
}

/// Run the batch over already-loaded files with the given stages.
///
/// # Errors
/// [`FintracksError::EmptyExtraction`] when at least one file was submitted
/// and none produced a transaction. An empty submission returns an empty
/// output.
pub async fn run_batch(
    files: &[StatementFile],
    rasterizer: &dyn Rasterizer,
    extractor: &dyn Extractor,
    config: &ExtractionConfig,
) -> Result<BatchOutput, FintracksError> {
    let start = Instant::now();
    let total = files.len();
    let callback = config.progress_callback.as_ref();
    info!("Starting batch: {} file(s)", total);

    if let Some(cb) = callback {
        cb.on_batch_start(total);
    }

    let mut results = Vec::with_capacity(total);
    for (i, file) in files.iter().enumerate() {
        results.push(process_file(i + 1, total, file, rasterizer, extractor, callback).await);
    }

    let transactions: Vec<Transaction> = results
        .iter()
        .flat_map(|r| r.records.iter().cloned())
        .collect();
    let stats = BatchStats::from_files(&results, start.elapsed().as_millis() as u64);

    if let Some(cb) = callback {
        cb.on_batch_complete(total, transactions.len());
    }

    info!(
        "Batch complete: {} record(s) from {}/{} file(s), {} failed, {}ms",
        stats.total_records, stats.extracted_files, total, stats.failed_files, stats.total_duration_ms
    );

    if transactions.is_empty() && total > 0 {
        return Err(FintracksError::EmptyExtraction { files: total });
    }

    Ok(BatchOutput {
        transactions,
        files: results,
        stats,
    })
}

/// Extract every file through all three stages, reporting progress.
///
/// Shared by the eager and streaming orchestrators. Never fails: errors are
/// recorded on the result.
pub(crate) async fn process_file(
    index: usize,
    total: usize,
    file: &StatementFile,
    rasterizer: &dyn Rasterizer,
    extractor: &dyn Extractor,
    callback: Option<&ProgressCallback>,
) -> FileResult {
    let start = Instant::now();
    if let Some(cb) = callback {
        cb.on_file_start(index, total, &file.name);
    }
    info!("[{}/{}] {} ({})", index, total, file.name, file.media_type.as_str());

    let mut result = FileResult {
        index,
        name: file.name.clone(),
        status: FileStatus::Failed,
        records: Vec::new(),
        page_images: 0,
        duration_ms: 0,
        error: None,
    };

    // ── Step 1: Rasterise ────────────────────────────────────────────────
    match rasterizer.rasterize(file).await {
        Err(e) => result.error = Some(e),
        Ok(images) if images.is_empty() => {
            result.status = FileStatus::Unsupported;
        }
        Ok(images) => {
            result.page_images = images.len();

            // ── Step 2: Extract ──────────────────────────────────────────
            match extractor.extract(&file.name, &images).await {
                Err(e) => result.error = Some(e),
                Ok(text) => {
                    // ── Step 3: Parse ────────────────────────────────────
                    result.records = parse_transactions(&text);
                    result.status = if result.records.is_empty() {
                        warn!("{}: response contained no usable rows", file.name);
                        FileStatus::NoRecords
                    } else {
                        FileStatus::Extracted
                    };
                }
            }
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;

    if let Some(ref e) = result.error {
        warn!("{}", e);
        if let Some(cb) = callback {
            cb.on_file_error(index, total, &e.to_string());
        }
    } else {
        debug!(
            "{}: {} image(s) → {} record(s) in {}ms",
            file.name,
            result.page_images,
            result.records.len(),
            result.duration_ms
        );
    }

    if let Some(cb) = callback {
        cb.on_progress(index, total);
    }
    result
}

/// Extract transactions from local paths or URLs.
///
/// The provider is resolved first, so a missing credential fails before
/// any file is read. Inputs are then loaded in order; an unreadable path is
/// fatal here, since the submission itself is wrong.
pub async fn extract_files(
    inputs: &[impl AsRef<str>],
    config: &ExtractionConfig,
) -> Result<BatchOutput, FintracksError> {
    let extractor = VisionExtractor::from_config(config)?;

    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        files.push(input::resolve_input(input.as_ref(), config.download_timeout_secs).await?);
    }

    let rasterizer = DocumentRasterizer::from_config(config);
    run_batch(&files, &rasterizer, &extractor, config).await
}

/// Extract transactions from uploads already held in memory.
pub async fn extract_uploads(
    files: &[StatementFile],
    config: &ExtractionConfig,
) -> Result<BatchOutput, FintracksError> {
    let provider = llm::resolve_provider(config)?;
    let extractor = VisionExtractor::new(provider, config);
    let rasterizer = DocumentRasterizer::from_config(config);
    run_batch(files, &rasterizer, &extractor, config).await
}

/// Synchronous wrapper around [`extract_files`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_files_sync(
    inputs: &[impl AsRef<str>],
    config: &ExtractionConfig,
) -> Result<BatchOutput, FintracksError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FintracksError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_files(inputs, config))
}
