//! Document rasterisation: one uploaded statement → ordered image payloads.
//!
//! * image upload → exactly one payload, original bytes, declared MIME type
//! * PDF upload   → one JPEG payload per page, in page order
//! * anything else → no payloads and a warning; never an error
//!
//! The [`Rasterizer`] trait is the seam the batch orchestrator drives, so
//! tests and alternative renderers can stand in for pdfium.

use crate::config::ExtractionConfig;
use crate::error::FileError;
use crate::pipeline::encode::{self, EncodedImage};
use crate::pipeline::input::{MediaType, StatementFile};
use crate::pipeline::render;
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Turns one statement file into the images sent to the extraction service.
pub trait Rasterizer: Send + Sync {
    /// Rasterise `file`.
    ///
    /// Returns `Ok(vec![])` for media types that cannot be rasterised.
    /// `Err` is reserved for files that should have worked but did not
    /// (corrupt PDF, encoder failure).
    fn rasterize<'a>(
        &'a self,
        file: &'a StatementFile,
    ) -> BoxFuture<'a, Result<Vec<EncodedImage>, FileError>>;
}

/// Production rasteriser: pass-through for images, pdfium for PDFs.
#[derive(Debug, Clone)]
pub struct DocumentRasterizer {
    scale: f32,
    jpeg_quality: u8,
}

impl DocumentRasterizer {
    pub fn new(scale: f32, jpeg_quality: u8) -> Self {
        Self {
            scale,
            jpeg_quality,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.render_scale, config.jpeg_quality)
    }

    async fn rasterize_pdf(&self, file: &StatementFile) -> Result<Vec<EncodedImage>, FileError> {
        let pages = render::render_pdf_pages(file.bytes.clone(), self.scale)
            .await
            .map_err(|e| FileError::RasterisationFailed {
                name: file.name.clone(),
                detail: e.to_string(),
            })?;

        pages
            .iter()
            .enumerate()
            .map(|(idx, img)| {
                encode::encode_jpeg(img, self.jpeg_quality).map_err(|e| FileError::EncodingFailed {
                    name: file.name.clone(),
                    page: idx + 1,
                    detail: e.to_string(),
                })
            })
            .collect()
    }
}

impl Default for DocumentRasterizer {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

impl Rasterizer for DocumentRasterizer {
    fn rasterize<'a>(
        &'a self,
        file: &'a StatementFile,
    ) -> BoxFuture<'a, Result<Vec<EncodedImage>, FileError>> {
        Box::pin(async move {
            if file.bytes.is_empty() {
                return Err(FileError::ReadFailed {
                    name: file.name.clone(),
                    detail: "file is empty".to_string(),
                });
            }
            let images = match &file.media_type {
                MediaType::Image(mime) => vec![encode::encode_raw(&file.bytes, mime)],
                MediaType::Pdf => self.rasterize_pdf(file).await?,
                MediaType::Other(mime) => {
                    warn!("Unsupported file type: {} ({}). Skipping file.", mime, file.name);
                    Vec::new()
                }
            };
            debug!("{}: {} image(s)", file.name, images.len());
            Ok(images)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_upload_is_one_payload() {
        let r = DocumentRasterizer::default();
        let file = StatementFile::from_bytes("photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0x00]);
        let images = tokio_test::block_on(r.rasterize(&file)).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/jpeg");
    }

    #[test]
    fn empty_file_is_a_read_failure() {
        let r = DocumentRasterizer::default();
        let file = StatementFile::from_bytes("blank.pdf", "application/pdf", Vec::new());
        let err = tokio_test::block_on(r.rasterize(&file)).unwrap_err();
        assert!(matches!(err, FileError::ReadFailed { .. }));
    }

    #[test]
    fn unsupported_type_yields_nothing() {
        let r = DocumentRasterizer::default();
        let file = StatementFile::from_bytes("ledger.xlsx", "application/vnd.ms-excel", vec![1, 2, 3]);
        let images = tokio_test::block_on(r.rasterize(&file)).unwrap();
        assert!(images.is_empty());
    }
}
