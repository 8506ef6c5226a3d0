//! Image encoding: pixels or raw upload bytes → base64 [`EncodedImage`].
//!
//! Rendered PDF pages are re-encoded as JPEG. A statement of twelve pages at
//! 1.5× scale is twelve images in a single request, and PNG would make that
//! request several times larger for no measurable gain in digit accuracy at
//! quality 90. Image uploads are forwarded byte-for-byte with their own MIME
//! type; re-encoding a phone photo can only lose detail.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A base64-encoded image payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
}

impl EncodedImage {
    /// Convert into the provider crate's image attachment.
    ///
    /// `detail: "high"` lets OpenAI-style providers tile the image instead
    /// of downsampling it to a single 512 px overview, which loses fine print.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type.clone()).with_detail("high")
    }
}

/// Wrap an uploaded image's bytes unchanged.
pub fn encode_raw(bytes: &[u8], mime_type: &str) -> EncodedImage {
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} upload → {} bytes base64", mime_type, data.len());
    EncodedImage {
        mime_type: mime_type.to_string(),
        data,
    }
}

/// Encode a rasterised page as a base64 JPEG at the given quality (1–100).
///
/// JPEG has no alpha channel, so the page is flattened to RGB first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        rgb.width(),
        rgb.height(),
        data.len()
    );

    Ok(EncodedImage {
        mime_type: "image/jpeg".to_string(),
        data,
    })
}
