//! File encoding: raw bytes → base64 data URL for the OCR request body.
//!
//! The OCR endpoint accepts documents inline as `data:<mime>;base64,<…>`
//! URLs. PDFs are always labelled `application/pdf` regardless of what the
//! upload claimed; images keep their original media type so the provider
//! can pick the right decoder.

use crate::error::DocumentKind;
use crate::pipeline::input::{FileHandle, MIME_PDF};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode `file` as a data URL for the given OCR path.
pub fn to_data_url(file: &FileHandle, kind: DocumentKind) -> String {
    let mime = match kind {
        DocumentKind::Pdf => MIME_PDF,
        DocumentKind::Image => file.media_type.as_str(),
    };
    let b64 = STANDARD.encode(&file.bytes);
    debug!("Encoded {} → {} bytes base64", file.name, b64.len());
    format!("data:{mime};base64,{b64}")
}
