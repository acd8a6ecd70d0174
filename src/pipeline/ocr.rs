//! OCR adapter: send a PDF or an image to the OCR capability and return
//! cleaned plain text.
//!
//! The two paths differ only in how the document is wrapped and which pages
//! are kept:
//!
//! | path  | request field  | `include_image_base64` | pages used          |
//! |-------|----------------|------------------------|---------------------|
//! | PDF   | `document_url` | `false`                | all, image-only skipped |
//! | image | `image_url`    | `true`                 | first               |
//!
//! Both run the same [`clean_ocr_markdown`] rules afterwards.

use crate::error::{DocumentKind, ExtractionError, ProviderError};
use crate::pipeline::encode::to_data_url;
use crate::pipeline::input::FileHandle;
use crate::pipeline::postprocess::{clean_ocr_markdown, join_pages};
use crate::provider::{OcrDocument, OcrProvider, OcrRequest, OcrResponse};
use std::sync::Arc;
use tracing::{debug, error};

/// Thin wrapper binding an [`OcrProvider`] to a model id.
#[derive(Clone)]
pub struct OcrClient {
    provider: Arc<dyn OcrProvider>,
    model: String,
}

impl OcrClient {
    pub fn new(provider: Arc<dyn OcrProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Extract the text of every page of a PDF.
    pub async fn process_pdf(&self, file: &FileHandle) -> Result<String, ExtractionError> {
        let request = self.build_request(file, DocumentKind::Pdf);
        let response = self.call(&request, DocumentKind::Pdf).await?;

        let joined = join_pages(response.pages.iter().map(|p| p.markdown.as_str()));
        let text = clean_ocr_markdown(&joined);
        debug!(
            "PDF OCR: {} pages → {} chars after cleanup",
            response.pages.len(),
            text.chars().count()
        );
        Ok(text)
    }

    /// Extract the text of a single image.
    pub async fn process_image(&self, file: &FileHandle) -> Result<String, ExtractionError> {
        let request = self.build_request(file, DocumentKind::Image);
        let response = self.call(&request, DocumentKind::Image).await?;

        let first = response
            .pages
            .first()
            .map(|p| p.markdown.as_str())
            .unwrap_or_default();
        let text = clean_ocr_markdown(first);
        debug!("Image OCR: {} chars after cleanup", text.chars().count());
        Ok(text)
    }

    fn build_request(&self, file: &FileHandle, kind: DocumentKind) -> OcrRequest {
        let url = to_data_url(file, kind);
        let (document, include_image_base64) = match kind {
            DocumentKind::Pdf => (OcrDocument::DocumentUrl { document_url: url }, false),
            DocumentKind::Image => (OcrDocument::ImageUrl { image_url: url }, true),
        };
        OcrRequest {
            model: self.model.clone(),
            document,
            include_image_base64: Some(include_image_base64),
        }
    }

    async fn call(
        &self,
        request: &OcrRequest,
        kind: DocumentKind,
    ) -> Result<OcrResponse, ExtractionError> {
        self.provider
            .ocr(request)
            .await
            .map_err(|source: ProviderError| {
                error!("{kind} OCR failed: {source}");
                ExtractionError { kind, source }
            })
    }
}
