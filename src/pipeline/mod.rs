//! Pipeline stages for statement extraction.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and the rasteriser or extractor swapped behind its
//! trait without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ llm ──▶ parse
//! (path/URL)  (render+encode)  (vision model)  (CSV → Transaction)
//! ```
//!
//! 1. [`input`] : load a local path or URL and decide its media type
//! 2. [`render`]: rasterise every PDF page via pdfium in `spawn_blocking`
//! 3. [`encode`]: JPEG re-encode and base64-wrap images for the request
//! 4. [`rasterize`]: the [`rasterize::Rasterizer`] seam tying 2 and 3
//!    together per file
//! 5. [`llm`]   : one request per document, with retry/backoff; the only
//!    stage with network I/O besides URL download
//! 6. [`parse`] : turn the generated table into transactions, dropping noise

pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod rasterize;
pub mod render;
