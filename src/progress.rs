//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch walks through the submitted statements.
//!
//! Files are processed strictly one after another, so events for file *i*
//! always arrive before any event for file *i + 1*, and
//! [`BatchProgressCallback::on_progress`] sees `1, 2, …, total` exactly once
//! each, whether the file succeeded, was skipped, or failed.
//!
//! # Example
//!
//! ```rust
//! use fintracks::{BatchProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_progress(&self, completed: usize, total: usize) {
//!         self.0.store(completed, Ordering::SeqCst);
//!         eprintln!("Processing file {completed} of {total}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch orchestrator as it processes each statement file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is rasterised.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position of the file in the submission
    /// * `total`: number of submitted files
    /// * `name` : display name of the file
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called after every file, whatever its outcome.
    ///
    /// `completed` is the number of files finished so far; it increases by
    /// one on every call and reaches `total` exactly once.
    fn on_progress(&self, completed: usize, total: usize) {
        let _ = (completed, total);
    }

    /// Called when a file fails (rasterisation or extraction error).
    ///
    /// Always followed by [`Self::on_progress`] for the same file.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, records: usize) {
        let _ = (total_files, records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
