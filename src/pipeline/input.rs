//! Input resolution: turn a user-supplied path or URL into an in-memory
//! statement upload with a declared media type.
//!
//! The rest of the pipeline only ever sees [`StatementFile`]: a display
//! name, a [`MediaType`], and the raw bytes. The media type is what the
//! rasteriser dispatches on, so it is decided here once: from the file
//! extension when there is one, otherwise by sniffing the magic bytes.

use crate::error::FintracksError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Declared media type of an uploaded statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaType {
    /// Any `image/*` type; the string is the full MIME type.
    Image(String),
    /// `application/pdf`
    Pdf,
    /// Anything else. Accepted at upload, rasterises to zero images.
    Other(String),
}

impl MediaType {
    /// Classify a MIME type string.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            MediaType::Pdf
        } else if mime.starts_with("image/") {
            MediaType::Image(mime)
        } else {
            MediaType::Other(mime)
        }
    }

    /// Guess the media type from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let mime = match ext.to_ascii_lowercase().as_str() {
            "pdf" => return Some(MediaType::Pdf),
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "heic" => "image/heic",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            _ => return None,
        };
        Some(MediaType::Image(mime.to_string()))
    }

    /// Guess the media type from the leading bytes of a file.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF") {
            MediaType::Pdf
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            MediaType::Image("image/png".into())
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            MediaType::Image("image/jpeg".into())
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            MediaType::Image("image/gif".into())
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            MediaType::Image("image/webp".into())
        } else {
            MediaType::Other("application/octet-stream".into())
        }
    }

    /// The MIME type string.
    pub fn as_str(&self) -> &str {
        match self {
            MediaType::Image(m) | MediaType::Other(m) => m,
            MediaType::Pdf => "application/pdf",
        }
    }
}

/// One uploaded statement, fully read into memory.
#[derive(Debug, Clone)]
pub struct StatementFile {
    /// Display name (file name or last URL segment).
    pub name: String,
    pub media_type: MediaType,
    pub bytes: Vec<u8>,
}

impl StatementFile {
    /// Build an upload from bytes already in memory with a declared MIME type.
    pub fn from_bytes(name: impl Into<String>, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: MediaType::from_mime(mime),
            bytes,
        }
    }

    /// Build an upload from bytes, deciding the media type from `name`'s
    /// extension and falling back to the magic bytes.
    pub fn detect(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(MediaType::from_extension)
            .unwrap_or_else(|| MediaType::sniff(&bytes));
        Self {
            name,
            media_type,
            bytes,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory statement.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<StatementFile, FintracksError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

/// Read a local statement file.
async fn resolve_local(path_str: &str) -> Result<StatementFile, FintracksError> {
    if path_str.trim().is_empty() {
        return Err(FintracksError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FintracksError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FintracksError::FileNotFound { path });
        }
        Err(_) if path.is_dir() => {
            return Err(FintracksError::InvalidInput {
                input: path_str.to_string(),
            });
        }
        Err(_) => return Err(FintracksError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    let file = StatementFile::detect(name, bytes);
    debug!(
        "Resolved local statement: {} ({}, {} bytes)",
        path.display(),
        file.media_type.as_str(),
        file.bytes.len()
    );
    Ok(file)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<StatementFile, FintracksError> {
    info!("Downloading statement from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| FintracksError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FintracksError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            FintracksError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(FintracksError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    // The server's Content-Type beats the URL extension when it is specific.
    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
        .filter(|m| m == "application/pdf" || m.starts_with("image/"));

    let name = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FintracksError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let file = match declared {
        Some(mime) => StatementFile::from_bytes(name, &mime, bytes),
        None => StatementFile::detect(name, bytes),
    };
    info!("Downloaded {} ({} bytes)", file.name, file.bytes.len());
    Ok(file)
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "statement".to_string()
}
