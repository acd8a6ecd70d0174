//! Generation orchestrator: one submission from form to notification.
//!
//! ## Sequence
//!
//! ```text
//! Idle ──▶ Extracting ──▶ Generating ──▶ Reporting ──▶ Idle
//!          (file only)
//! ```
//!
//! 1. open the loading notification
//! 2. if a file is attached, run the [`FileProcessor`] on the first one and
//!    inject the text as `text_from_pdf`
//! 3. run the [`CardClient`]
//! 4. hand the outcome to the [`OutcomeNotifier`], which dismisses the
//!    loading notification and shows exactly one terminal notification
//!
//! Extraction always completes before generation starts. There is no
//! reentrancy guard: callers disable submission while
//! [`CardPipeline::is_pending`] is true.

use crate::config::{ClientConfig, GenerationConfig};
use crate::error::{AnkiForgeError, GenerationFailure};
use crate::notify::{CardRows, FormState, Notifier, OutcomeNotifier, LOADING_MESSAGE, UNEXPECTED_ERROR_MESSAGE};
use crate::output::{CardRow, GenerationOutcome, GenerationRequest};
use crate::pipeline::files::FileProcessor;
use crate::pipeline::generate::CardClient;
use crate::pipeline::ocr::OcrClient;
use crate::provider::{CompletionProvider, MistralClient, OcrProvider};
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info};

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Extracting,
    Generating,
    Reporting,
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationPhase::Idle => "idle",
            GenerationPhase::Extracting => "extracting",
            GenerationPhase::Generating => "generating",
            GenerationPhase::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

/// Drives submissions through extraction, generation and reporting.
pub struct CardPipeline {
    files: FileProcessor,
    cards: CardClient,
    outcome: OutcomeNotifier,
    rows: CardRows,
    phase: Mutex<GenerationPhase>,
    pending: AtomicBool,
}

impl CardPipeline {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        completion: Arc<dyn CompletionProvider>,
        notifier: Arc<dyn Notifier>,
        form: Arc<dyn FormState>,
        config: GenerationConfig,
    ) -> Self {
        let rows: CardRows = Arc::default();
        let files = FileProcessor::new(OcrClient::new(ocr, config.ocr_model.clone()), config.retry);
        Self {
            files,
            cards: CardClient::new(completion, config),
            outcome: OutcomeNotifier::new(notifier, form, rows.clone()),
            rows,
            phase: Mutex::new(GenerationPhase::Idle),
            pending: AtomicBool::new(false),
        }
    }

    /// Build a pipeline backed by the Mistral API for both capabilities.
    pub fn with_mistral(
        client: &ClientConfig,
        notifier: Arc<dyn Notifier>,
        form: Arc<dyn FormState>,
        config: GenerationConfig,
    ) -> Result<Self, AnkiForgeError> {
        let mistral = Arc::new(MistralClient::new(client)?);
        Ok(Self::new(mistral.clone(), mistral, notifier, form, config))
    }

    pub fn phase(&self) -> GenerationPhase {
        match self.phase.lock() {
            Ok(p) => *p,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Rows stored by the last successful submission.
    pub fn rows(&self) -> Vec<CardRow> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Run one submission end to end.
    ///
    /// Never fails: every outcome, a caught panic included, ends in exactly
    /// one terminal notification. The returned outcome is the one that was
    /// reported.
    pub async fn generate_cards(&self, request: GenerationRequest) -> GenerationOutcome {
        let start = Instant::now();
        self.pending.store(true, Ordering::SeqCst);
        let toast = self.outcome.notifier().loading(LOADING_MESSAGE);

        let outcome = match AssertUnwindSafe(self.run(request)).catch_unwind().await {
            Ok(outcome) => {
                self.set_phase(GenerationPhase::Reporting);
                self.outcome.display(&outcome, &toast);
                outcome
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("Card generation panicked: {detail}");
                self.set_phase(GenerationPhase::Reporting);
                self.outcome.display_unexpected(&toast);
                GenerationOutcome::failure(GenerationFailure {
                    error: UNEXPECTED_ERROR_MESSAGE.to_string(),
                    status: 500,
                })
            }
        };

        self.set_phase(GenerationPhase::Idle);
        self.pending.store(false, Ordering::SeqCst);
        info!(
            "Submission finished with status {} in {:?}",
            outcome.status,
            start.elapsed()
        );
        outcome
    }

    async fn run(&self, mut request: GenerationRequest) -> GenerationOutcome {
        // ── Step 1: Extract text from the first attached file ───────────
        if let Some(file) = request.first_file() {
            self.set_phase(GenerationPhase::Extracting);
            let extracted = self.files.process_file(file).await;
            if let Some(text) = extracted.filter(|t| !t.is_empty()) {
                self.outcome.form().set_text_from_pdf(&text);
                request.text_from_pdf = Some(text);
            }
        }

        // ── Step 2: Generate cards ──────────────────────────────────────
        self.set_phase(GenerationPhase::Generating);
        let card_type = request.card_type;
        let result = self.cards.parse(&request).await;
        GenerationOutcome::from_result(result, card_type)
    }

    fn set_phase(&self, phase: GenerationPhase) {
        let mut current = match self.phase.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current != phase {
            info!("Generation phase: {} → {}", *current, phase);
            *current = phase;
        }
    }
}
