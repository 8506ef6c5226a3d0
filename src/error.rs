//! Error types for the fintracks library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FintracksError`]: **Fatal**: the operation cannot proceed at all
//!   (no provider configured, bad input path, nothing extracted from any
//!   file, storage failure). Returned as `Err(FintracksError)`.
//!
//! * [`FileError`]: **Non-fatal**: a single statement failed (corrupt PDF,
//!   unreachable extraction service) but the rest of the batch is fine.
//!   Stored inside [`crate::batch::FileResult`] so one bad statement never
//!   blocks extraction of the others.
//!
//! Soft conditions (an unsupported media type, a response without the
//! mandatory columns) are neither: they are logged with `tracing::warn!`
//! and surface as an empty result plus a [`crate::batch::FileStatus`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the fintracks library.
#[derive(Debug, Error)]
pub enum FintracksError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Statement file was not found at the given path.
    #[error("Statement file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a readable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// No extraction provider could be configured (missing API key etc.).
    #[error("Extraction provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every submitted file failed or produced no usable rows.
    #[error(
        "No transactions were found in the {files} uploaded file(s). \
Please ensure the documents are legible bank or credit card statements."
    )]
    EmptyExtraction { files: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library in the working directory."
    )]
    PdfiumBindingFailed(String),

    // ── Account / ledger errors ───────────────────────────────────────────
    /// Credential or session problem at the portal boundary.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The key-value store could not be read or written.
    #[error("Storage error for key '{key}': {detail}")]
    Storage { key: String, detail: String },

    /// Could not write an export file.
    #[error("Failed to write export file '{path}': {source}")]
    ExportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single statement file.
///
/// Stored alongside [`crate::batch::FileResult`] when a file fails.
/// The batch continues unless every file comes back empty.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum FileError {
    /// The file bytes could not be read.
    #[error("{name}: could not read file: {detail}")]
    ReadFailed { name: String, detail: String },

    /// A PDF page could not be rendered.
    #[error("{name}: rasterisation failed: {detail}")]
    RasterisationFailed { name: String, detail: String },

    /// A rendered page could not be re-encoded.
    #[error("{name}: page {page} could not be encoded: {detail}")]
    EncodingFailed {
        name: String,
        page: usize,
        detail: String,
    },

    /// The extraction service returned an error after all retries.
    #[error("{name}: extraction service failed after {retries} retries: {detail}")]
    ServiceFailed {
        name: String,
        retries: u32,
        detail: String,
    },

    /// The extraction service did not answer in time.
    #[error("{name}: extraction service timed out after {secs}s")]
    Timeout { name: String, secs: u64 },
}

/// Portal-boundary errors, redisplayed to the user for correction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("User already exists")]
    UserExists,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No active session; log in first")]
    NotLoggedIn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extraction_display() {
        let e = FintracksError::EmptyExtraction { files: 3 };
        let msg = e.to_string();
        assert!(msg.contains("3 uploaded"), "got: {msg}");
        assert!(msg.contains("No transactions"));
    }

    #[test]
    fn service_failed_display() {
        let e = FileError::ServiceFailed {
            name: "march.pdf".into(),
            retries: 2,
            detail: "quota exceeded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("march.pdf"));
        assert!(msg.contains("quota exceeded"));
    }

    #[test]
    fn timeout_display() {
        let e = FileError::Timeout {
            name: "card.png".into(),
            secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }

    #[test]
    fn validation_is_transparent() {
        let e: FintracksError = ValidationError::UserExists.into();
        assert_eq!(e.to_string(), "User already exists");
    }

    #[test]
    fn file_error_serialises() {
        let e = FileError::RasterisationFailed {
            name: "x.pdf".into(),
            detail: "bad xref".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("RasterisationFailed"));
    }
}
