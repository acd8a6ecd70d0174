//! # ankiforge
//!
//! Generate Anki flashcards for Japanese study from typed text, images and
//! PDFs, using Mistral OCR and schema-constrained chat completion.
//!
//! ## Why this crate?
//!
//! Textbook pages are the natural source of study material, but copying
//! them into cards by hand is slow. This crate reads the page with an OCR
//! model, strips the layout noise, and asks a chat model for a fixed number
//! of cards in one of two strict schemas, so the result can be imported into
//! Anki as-is.
//!
//! ## Pipeline Overview
//!
//! ```text
//! GenerationRequest
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   PDF / image → OCR → cleaned text (429s retried, failures swallowed)
//!  ├─ 3. Generate  system + user prompt, JSON-schema response, retried on 429
//!  ├─ 4. Report    one terminal notification, rows stored, form reset
//!  └─ 5. Export    CSV for Anki import
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ankiforge::{CardPipeline, ClientConfig, GenerationConfig, GenerationRequest};
//! use ankiforge::notify::{NoopForm, NoopNotifier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads MISTRAL_API_KEY
//!     let pipeline = CardPipeline::with_mistral(
//!         &ClientConfig::from_env(),
//!         Arc::new(NoopNotifier),
//!         Arc::new(NoopForm),
//!         GenerationConfig::default(),
//!     )?;
//!     let request = GenerationRequest::builder()
//!         .text("毎朝コーヒーを飲みます")
//!         .number_of_cards(3)
//!         .build()?;
//!     let outcome = pipeline.generate_cards(request).await;
//!     print!("{}", ankiforge::export::to_csv(&pipeline.rows()));
//!     eprintln!("status: {}", outcome.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ankiforge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ankiforge = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod notify;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod storage;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chat::store::{MessageRing, MessageStore};
pub use chat::tutor::ChatTutor;
pub use chat::{ChatMessage, ChatSession};
pub use config::{ClientConfig, Environment, GenerationConfig, GenerationConfigBuilder};
pub use error::{
    AnkiForgeError, DocumentKind, ExtractionError, GenerationError, GenerationFailure,
    ProviderError, StatusCoded, StorageError,
};
pub use notify::{FormState, Notifier, OutcomeNotifier, ToastId};
pub use orchestrator::{CardPipeline, GenerationPhase};
pub use output::{CardRow, CardType, GenerationOutcome, GenerationRequest};
pub use pipeline::files::FileProcessor;
pub use pipeline::generate::CardClient;
pub use pipeline::input::FileHandle;
pub use pipeline::ocr::OcrClient;
pub use provider::{CompletionProvider, MistralClient, OcrProvider};
pub use retry::{is_rate_limited, retry_with_backoff, RetryPolicy};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, SafeStorage};
