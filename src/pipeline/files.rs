//! File processor: route an uploaded file to the matching OCR path.
//!
//! Dispatch is on the declared media type only:
//!
//! * `application/pdf` → [`OcrClient::process_pdf`]
//! * `image/jpeg`, `image/png` → [`OcrClient::process_image`]
//! * anything else → no text, no OCR call
//!
//! Each OCR call is wrapped in [`retry_with_backoff`] with the rate-limit
//! classifier. Failures never propagate: they are logged and the submission
//! continues without extracted text, so a bad scan does not block typed
//! input from being turned into cards.

use crate::error::{AnkiForgeError, ExtractionError};
use crate::pipeline::input::{FileHandle, MIME_JPEG, MIME_PDF, MIME_PNG};
use crate::pipeline::ocr::OcrClient;
use crate::retry::{is_rate_limited, retry_with_backoff, RetryPolicy};
use tracing::{debug, error, info};

/// Media types accepted by the upload form.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &[MIME_PDF, MIME_JPEG, MIME_PNG];

#[derive(Clone)]
pub struct FileProcessor {
    ocr: OcrClient,
    retry: RetryPolicy,
}

impl FileProcessor {
    pub fn new(ocr: OcrClient, retry: RetryPolicy) -> Self {
        Self { ocr, retry }
    }

    /// Extract text from `file`, or `None` when the type is unsupported or
    /// OCR failed after retries.
    pub async fn process_file(&self, file: &FileHandle) -> Option<String> {
        let result: Result<String, ExtractionError> = match file.media_type.as_str() {
            MIME_PDF => {
                info!("Extracting text from PDF '{}'", file.name);
                retry_with_backoff(&self.retry, is_rate_limited, || self.ocr.process_pdf(file))
                    .await
            }
            MIME_JPEG | MIME_PNG => {
                info!("Extracting text from image '{}'", file.name);
                retry_with_backoff(&self.retry, is_rate_limited, || {
                    self.ocr.process_image(file)
                })
                .await
            }
            other => {
                debug!("No OCR for '{}' ({other})", file.name);
                return None;
            }
        };

        match result {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Error processing file '{}': {e} ({})", file.name, e.source);
                None
            }
        }
    }
}

/// Reject files larger than `max_mb` megabytes.
pub fn validate_file_size(file: &FileHandle, max_mb: u64) -> Result<(), AnkiForgeError> {
    let limit = max_mb.saturating_mul(1024 * 1024);
    if file.size() as u64 > limit {
        return Err(AnkiForgeError::InvalidConfig(format!(
            "file '{}' is {} bytes, the limit is {max_mb} MB",
            file.name,
            file.size()
        )));
    }
    Ok(())
}

/// Reject files whose media type is not in `allowed`.
pub fn validate_file_type(file: &FileHandle, allowed: &[&str]) -> Result<(), AnkiForgeError> {
    if !allowed.contains(&file.media_type.as_str()) {
        return Err(AnkiForgeError::InvalidConfig(format!(
            "file '{}' has unsupported type {} (accepted: {})",
            file.name,
            file.media_type,
            allowed.join(", ")
        )));
    }
    Ok(())
}
