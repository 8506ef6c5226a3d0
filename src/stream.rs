//! Streaming batch API: emit each file's result as it completes.
//!
//! Unlike [`crate::batch::run_batch`], which returns only after every file
//! is done, [`extract_stream`] yields one [`FileResult`] per submitted file
//! so callers can show records as soon as a statement is read. Files are
//! still processed one at a time and yielded in submission order; the
//! stream only starts the next file when polled for it.
//!
//! The stream never fails. A file that went wrong is yielded with
//! `status: Failed` and its error attached, and an empty overall result is
//! for the caller to judge. Progress callbacks receive per-file events
//! only; there is no batch start/complete pair.

use crate::batch::{process_file, FileResult};
use crate::config::ExtractionConfig;
use crate::error::FintracksError;
use crate::pipeline::input::{self, StatementFile};
use crate::pipeline::llm::{Extractor, VisionExtractor};
use crate::pipeline::rasterize::{DocumentRasterizer, Rasterizer};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file results.
pub type FileStream = Pin<Box<dyn Stream<Item = FileResult> + Send>>;

/// Stream extraction results for already-loaded files.
pub fn extract_stream(
    files: Vec<StatementFile>,
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn Extractor>,
    config: &ExtractionConfig,
) -> FileStream {
    let total = files.len();
    let callback = config.progress_callback.clone();
    info!("Starting streaming batch: {} file(s)", total);

    let s = stream::iter(files.into_iter().enumerate()).then(move |(i, file)| {
        let rasterizer = Arc::clone(&rasterizer);
        let extractor = Arc::clone(&extractor);
        let callback = callback.clone();
        async move {
            process_file(
                i + 1,
                total,
                &file,
                rasterizer.as_ref(),
                extractor.as_ref(),
                callback.as_ref(),
            )
            .await
        }
    });

    Box::pin(s)
}

/// Resolve the provider and every input, then stream their results.
///
/// # Returns
/// - `Ok(FileStream)`: one [`FileResult`] per input
/// - `Err(FintracksError)`: fatal error (provider not configured, input
///   not found, download failed)
///
/// # Example
/// ```rust,no_run
/// use fintracks::{stream_inputs, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let mut results = stream_inputs(&["january.pdf", "february.pdf"], &config).await?;
/// while let Some(file) = results.next().await {
///     println!("{}: {} record(s)", file.name, file.records.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn stream_inputs(
    inputs: &[impl AsRef<str>],
    config: &ExtractionConfig,
) -> Result<FileStream, FintracksError> {
    let extractor = VisionExtractor::from_config(config)?;

    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        files.push(input::resolve_input(input.as_ref(), config.download_timeout_secs).await?);
    }

    Ok(extract_stream(
        files,
        Arc::new(DocumentRasterizer::from_config(config)),
        Arc::new(extractor),
        config,
    ))
}
