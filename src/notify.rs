//! Notification channel, form state and the outcome notifier.
//!
//! The pipeline never talks to a terminal or a UI directly. Inject an
//! [`Arc<dyn Notifier>`] to receive the loading / success / error lifecycle
//! of each submission, and an [`Arc<dyn FormState>`] to receive the form
//! updates (extracted text, reset after success).
//!
//! Both traits are `Send + Sync` with default no-op methods so callers only
//! override what they care about.
//!
//! # Example
//!
//! ```rust
//! use ankiforge::notify::{Notifier, ToastId};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingErrors {
//!     errors: AtomicUsize,
//! }
//!
//! impl Notifier for CountingErrors {
//!     fn error(&self, message: &str) {
//!         self.errors.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("error: {message}");
//!     }
//! }
//!
//! let notifier: Arc<dyn Notifier> = Arc::new(CountingErrors { errors: AtomicUsize::new(0) });
//! let id: ToastId = notifier.loading("Generating cards");
//! notifier.dismiss(&id);
//! ```

use crate::output::{CardRow, CardType, GenerationOutcome};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Message shown while a submission is in flight.
pub const LOADING_MESSAGE: &str = "Generating cards";
/// Message shown when cards were generated.
pub const SUCCESS_MESSAGE: &str = "Generation complete";
/// Fallback message when no specific error is available.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";
/// How long the success notification stays up.
pub const SUCCESS_AUTO_CLOSE: Duration = Duration::from_secs(3);

static NEXT_TOAST: AtomicU64 = AtomicU64::new(1);

/// Handle of an open notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToastId(String);

impl ToastId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A process-unique id.
    pub fn next() -> Self {
        Self(format!("toast-{}", NEXT_TOAST.fetch_add(1, Ordering::Relaxed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-facing notification channel.
pub trait Notifier: Send + Sync {
    /// Open a persistent loading notification.
    fn loading(&self, message: &str) -> ToastId {
        let _ = message;
        ToastId::next()
    }

    /// Show a success notification, closed after `auto_close` if set.
    fn success(&self, message: &str, auto_close: Option<Duration>) {
        let _ = (message, auto_close);
    }

    fn error(&self, message: &str) {
        let _ = message;
    }

    fn dismiss(&self, id: &ToastId) {
        let _ = id;
    }
}

/// A notifier that shows nothing.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {}

/// The card form the submission came from.
pub trait FormState: Send + Sync {
    /// Mirror the extracted file text into the form.
    fn set_text_from_pdf(&self, text: &str) {
        let _ = text;
    }

    /// Clear the form, keeping the selected card type.
    fn reset(&self, card_type: Option<CardType>) {
        let _ = card_type;
    }
}

/// A form that ignores every update.
pub struct NoopForm;

impl FormState for NoopForm {}

/// Rows of the last successful generation, shared with the orchestrator.
pub type CardRows = Arc<Mutex<Vec<CardRow>>>;

/// Maps a terminal [`GenerationOutcome`] onto notifications, stored rows and
/// a form reset.
///
/// | outcome                         | effect                                              |
/// |---------------------------------|-----------------------------------------------------|
/// | rows present, status 200        | store rows, success (3 s), reset keeping card type  |
/// | error present, status 500       | error with that message                             |
/// | anything else                   | error "An unexpected error occurred"                |
///
/// The loading notification is dismissed in every branch, once.
#[derive(Clone)]
pub struct OutcomeNotifier {
    notifier: Arc<dyn Notifier>,
    form: Arc<dyn FormState>,
    rows: CardRows,
}

impl OutcomeNotifier {
    pub fn new(notifier: Arc<dyn Notifier>, form: Arc<dyn FormState>, rows: CardRows) -> Self {
        Self {
            notifier,
            form,
            rows,
        }
    }

    pub fn display(&self, outcome: &GenerationOutcome, loading: &ToastId) {
        self.notifier.dismiss(loading);

        match outcome {
            GenerationOutcome {
                data: Some(rows),
                status: 200,
                card_type,
                ..
            } => {
                debug!("Storing {} generated cards", rows.len());
                match self.rows.lock() {
                    Ok(mut stored) => *stored = rows.clone(),
                    Err(poisoned) => *poisoned.into_inner() = rows.clone(),
                }
                self.notifier.success(SUCCESS_MESSAGE, Some(SUCCESS_AUTO_CLOSE));
                self.form.reset(*card_type);
            }
            GenerationOutcome {
                error: Some(message),
                status: 500,
                ..
            } => self.notifier.error(message),
            _ => self.notifier.error(UNEXPECTED_ERROR_MESSAGE),
        }
    }

    /// Report a failure that never produced an outcome.
    pub fn display_unexpected(&self, loading: &ToastId) {
        self.notifier.dismiss(loading);
        self.notifier.error(UNEXPECTED_ERROR_MESSAGE);
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn form(&self) -> &Arc<dyn FormState> {
        &self.form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationFailure;

    #[derive(Default)]
    struct TrackingNotifier {
        events: Mutex<Vec<String>>,
    }

    impl TrackingNotifier {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for TrackingNotifier {
        fn success(&self, message: &str, auto_close: Option<Duration>) {
            self.events
                .lock()
                .unwrap()
                .push(format!("success:{message}:{:?}", auto_close));
        }

        fn error(&self, message: &str) {
            self.events.lock().unwrap().push(format!("error:{message}"));
        }

        fn dismiss(&self, id: &ToastId) {
            self.events.lock().unwrap().push(format!("dismiss:{id}"));
        }
    }

    #[derive(Default)]
    struct TrackingForm {
        resets: Mutex<Vec<Option<CardType>>>,
    }

    impl FormState for TrackingForm {
        fn reset(&self, card_type: Option<CardType>) {
            self.resets.lock().unwrap().push(card_type);
        }
    }

    fn setup() -> (OutcomeNotifier, Arc<TrackingNotifier>, Arc<TrackingForm>, CardRows) {
        let notifier = Arc::new(TrackingNotifier::default());
        let form = Arc::new(TrackingForm::default());
        let rows: CardRows = Arc::default();
        let on = OutcomeNotifier::new(notifier.clone(), form.clone(), rows.clone());
        (on, notifier, form, rows)
    }

    #[test]
    fn success_stores_rows_and_resets_form() {
        let (on, notifier, form, rows) = setup();
        let outcome = GenerationOutcome::success(vec![CardRow::from(["Q", "A"])], CardType::Kanji);

        on.display(&outcome, &ToastId::new("t1"));

        assert_eq!(*rows.lock().unwrap(), vec![CardRow::from(["Q", "A"])]);
        assert_eq!(
            notifier.events(),
            vec![
                "dismiss:t1".to_string(),
                format!("success:{SUCCESS_MESSAGE}:Some(3s)"),
            ]
        );
        assert_eq!(*form.resets.lock().unwrap(), vec![Some(CardType::Kanji)]);
    }

    #[test]
    fn failure_shows_specific_message() {
        let (on, notifier, form, rows) = setup();
        let outcome = GenerationOutcome::failure(GenerationFailure {
            error: "X".into(),
            status: 500,
        });

        on.display(&outcome, &ToastId::new("t2"));

        assert_eq!(notifier.events(), vec!["dismiss:t2", "error:X"]);
        assert!(rows.lock().unwrap().is_empty());
        assert!(form.resets.lock().unwrap().is_empty());
    }

    #[test]
    fn success_status_without_data_is_unexpected() {
        let (on, notifier, form, rows) = setup();
        let outcome = GenerationOutcome {
            data: None,
            status: 200,
            error: None,
            card_type: None,
        };

        on.display(&outcome, &ToastId::new("t3"));

        assert_eq!(
            notifier.events(),
            vec!["dismiss:t3".to_string(), format!("error:{UNEXPECTED_ERROR_MESSAGE}")]
        );
        assert!(rows.lock().unwrap().is_empty());
        assert!(form.resets.lock().unwrap().is_empty());
    }

    #[test]
    fn error_with_success_status_is_unexpected() {
        let (on, notifier, form, rows) = setup();
        let outcome = GenerationOutcome {
            data: None,
            status: 200,
            error: Some("X".into()),
            card_type: Some(CardType::Basic),
        };

        on.display(&outcome, &ToastId::new("t4"));

        assert_eq!(
            notifier.events(),
            vec!["dismiss:t4".to_string(), format!("error:{UNEXPECTED_ERROR_MESSAGE}")]
        );
        assert!(rows.lock().unwrap().is_empty());
        assert!(form.resets.lock().unwrap().is_empty());
    }

    #[test]
    fn unknown_status_is_unexpected() {
        let (on, notifier, _, rows) = setup();
        let outcome = GenerationOutcome {
            data: Some(vec![CardRow::from(["Q", "A"])]),
            status: 404,
            error: None,
            card_type: None,
        };

        on.display(&outcome, &ToastId::new("t5"));

        assert_eq!(
            notifier.events(),
            vec!["dismiss:t5".to_string(), format!("error:{UNEXPECTED_ERROR_MESSAGE}")]
        );
        assert!(rows.lock().unwrap().is_empty());
    }

    #[test]
    fn noop_notifier_hands_out_distinct_ids() {
        let n: Arc<dyn Notifier> = Arc::new(NoopNotifier);
        let a = n.loading(LOADING_MESSAGE);
        let b = n.loading(LOADING_MESSAGE);
        assert_ne!(a, b);
        n.success("ok", None);
        n.error("bad");
        n.dismiss(&a);
        NoopForm.set_text_from_pdf("x");
        NoopForm.reset(None);
    }
}
