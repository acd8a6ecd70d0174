//! Pipeline stages for turning uploads and typed text into flashcards.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the provider be swapped without
//! touching cleanup or dispatch logic.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ files ──▶ ocr ──▶ encode ──▶ postprocess ──▶ generate
//! (path/URL) (dispatch)  (OCR API)  (base64)   (cleanup)      (chat API)
//! ```
//!
//! 1. [`input`]: read a local path or download a URL into a `FileHandle`
//! 2. [`files`]: pick the OCR path from the media type, wrap it in retry,
//!    swallow failures
//! 3. [`ocr`]: call the OCR capability for a PDF or an image
//! 4. [`encode`]: base64-wrap the bytes as a data URL for the request body
//! 5. [`postprocess`]: deterministic cleanup of OCR markdown
//! 6. [`generate`]: schema-constrained card generation with retry

pub mod encode;
pub mod files;
pub mod generate;
pub mod input;
pub mod ocr;
pub mod postprocess;
