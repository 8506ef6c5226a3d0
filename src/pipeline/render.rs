//! PDF rasterisation: render every page of an uploaded PDF via pdfium.
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-safe, so the work runs inside `tokio::task::spawn_blocking`.
//!
//! Pages are rendered strictly in document order, and each page's bitmap is
//! fully converted into an owned image before the next page is loaded. The
//! extraction service gets no page numbers, only image order, so this order
//! is the only positional signal it sees.

use crate::error::FintracksError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Rasterise every page of a PDF held in memory, in page order.
///
/// `scale` multiplies the page's nominal size (1.0 = 72 points per inch).
pub async fn render_pdf_pages(bytes: Vec<u8>, scale: f32) -> Result<Vec<DynamicImage>, FintracksError> {
    tokio::task::spawn_blocking(move || render_pdf_pages_blocking(&bytes, scale))
        .await
        .map_err(|e| FintracksError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pdf_pages_blocking(bytes: &[u8], scale: f32) -> Result<Vec<DynamicImage>, FintracksError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| FintracksError::Internal(format!("PDF could not be opened: {:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            FintracksError::Internal(format!("page {} failed to render: {:?}", idx + 1, e))
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

/// Bind to a pdfium shared library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, then a library next to the working
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, FintracksError> {
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| FintracksError::PdfiumBindingFailed(format!("{}: {}", p, e)));
        }
        debug!("PDFIUM_LIB_PATH '{}' does not exist; trying defaults", p);
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| FintracksError::PdfiumBindingFailed(e.to_string()))
}
