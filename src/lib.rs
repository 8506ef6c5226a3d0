//! # fintracks
//!
//! Digitise bank and credit-card statements into a personal transaction
//! ledger using vision language models.
//!
//! ## Why this crate?
//!
//! Statements arrive as scanned PDFs and phone photos. Text extraction
//! loses the table structure, and every bank lays out debits, credits and
//! running balances differently. Instead this crate rasterises each
//! statement, shows the whole document to a vision model in one request,
//! asks for a fixed five-column CSV, and parses that answer defensively
//! into signed, categorised transactions.
//!
//! ## Pipeline Overview
//!
//! ```text
//! statement files
//!  │
//!  ├─ 1. Input      resolve local path or download from URL
//!  ├─ 2. Rasterise  image as-is, or every PDF page via pdfium → JPEG
//!  ├─ 3. Extract    one vision-model request per file (gemini / openai / …)
//!  ├─ 4. Parse      CSV → Transaction, noise rows dropped
//!  └─ 5. Ledger     append to the signed-in user's ledger, write-through
//! ```
//!
//! Files are processed strictly one at a time; a file that fails is
//! recorded and skipped, and only a batch that yields nothing at all is an
//! error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fintracks::{auth, extract_files, ExtractionConfig, FileStore, Ledger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileStore::open(".fintracks")?);
//!     let session = auth::login(store.as_ref(), "ada", "correct horse")?;
//!     let mut ledger = Ledger::open(session, store)?;
//!
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let output = extract_files(&["january.pdf", "receipt.jpg"], &config).await?;
//!     ledger.append_batch(output.transactions)?;
//!
//!     let summary = ledger.aggregates().summary;
//!     println!("net: {:.2}", summary.net);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fintracks` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! fintracks = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod aggregates;
pub mod auth;
pub mod batch;
pub mod categories;
pub mod config;
pub mod error;
pub mod export;
pub mod ledger;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;
pub mod transaction;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use aggregates::{Aggregates, CategoryTotal, Summary};
pub use auth::Session;
pub use batch::{
    extract_files, extract_files_sync, extract_uploads, run_batch, BatchOutput, BatchStats,
    FileResult, FileStatus,
};
pub use categories::{VocabularyDelta, DEFAULT_CATEGORIES};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{FileError, FintracksError, ValidationError};
pub use export::{export_filename, to_delimited, write_csv, Delimiter};
pub use ledger::Ledger;
pub use pipeline::encode::EncodedImage;
pub use pipeline::input::{MediaType, StatementFile};
pub use pipeline::llm::{Extractor, VisionExtractor};
pub use pipeline::parse::parse_transactions;
pub use pipeline::rasterize::{DocumentRasterizer, Rasterizer};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{FileStore, KeyValueStore, MemoryStore, UserAccount};
pub use stream::{extract_stream, stream_inputs, FileStream};
pub use transaction::Transaction;
