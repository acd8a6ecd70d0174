//! Error types for the ankiforge library.
//!
//! The layers of the generation pipeline pick different
//! propagation strategies, so each gets its own error type:
//!
//! * [`AnkiForgeError`]: **Fatal**: the pipeline cannot even be set up
//!   (missing API key, unreadable input file, export write failure). Returned
//!   as `Err(AnkiForgeError)` from constructors and I/O entry points.
//!
//! * [`ProviderError`]: a call to the external OCR or chat capability
//!   failed. Carries the HTTP status when there was one, which is the only
//!   signal the backoff executor looks at.
//!
//! * [`ExtractionError`]: the OCR adapter failed. Propagated to the file
//!   processor, which logs it and degrades to "no extracted text".
//!
//! * [`GenerationError`]: the card client failed. Never propagated: it is
//!   converted into a [`GenerationFailure`] value so the orchestrator keeps
//!   flowing toward a user notification.
//!
//! * [`StorageError`]: the key-value capability refused an operation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// HTTP status signalling that the provider is rate-limiting us.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// Anything that may carry an HTTP-like status code.
///
/// The backoff executor's default classifier only inspects this, so it does
/// not depend on the error shape of any particular SDK.
pub trait StatusCoded {
    fn status_code(&self) -> Option<u16>;
}

/// All fatal errors returned by the ankiforge library.
#[derive(Debug, Error)]
pub enum AnkiForgeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Provider setup errors ─────────────────────────────────────────────
    /// No API key was found in the configuration or environment.
    #[error("MISTRAL_API_KEY is required\nExport it or pass --api-key.")]
    MissingApiKey,

    /// The API key does not look like a Mistral key.
    #[error("Invalid MISTRAL_API_KEY: {0}")]
    InvalidApiKey(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the exported cards file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the external OCR or chat-completion capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status of the failed response, `None` for transport failures.
    pub status_code: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// An error that came back as an HTTP response.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status),
            message: message.into(),
        }
    }

    /// A transport, decoding or other status-less failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
        }
    }

    /// Shorthand for the 429 response the backoff executor retries on.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::http(RATE_LIMIT_STATUS, message)
    }
}

impl StatusCoded for ProviderError {
    fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}

/// Which OCR path failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => f.write_str("PDF"),
            DocumentKind::Image => f.write_str("image"),
        }
    }
}

/// The OCR adapter could not turn a file into text.
///
/// The status code of the underlying provider error stays visible through
/// [`StatusCoded`], so a backoff wrapper around the adapter still sees 429s.
#[derive(Debug, Clone, Error)]
#[error("Error in {kind} to text conversion")]
pub struct ExtractionError {
    pub kind: DocumentKind,
    #[source]
    pub source: ProviderError,
}

impl StatusCoded for ExtractionError {
    fn status_code(&self) -> Option<u16> {
        self.source.status_code
    }
}

/// Internal failure modes of the card generation client.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The provider call failed after all retries.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The first choice carried no structured payload, or an empty one.
    #[error("The model response was empty or could not be parsed")]
    EmptyResponse,

    /// The payload was present but did not match the card schema.
    #[error("The model response does not match the card schema: {0}")]
    InvalidPayload(String),
}

/// A generation failure as returned to the orchestrator: data, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{error} (status {status})")]
pub struct GenerationFailure {
    pub error: String,
    pub status: u16,
}

impl From<GenerationError> for GenerationFailure {
    fn from(e: GenerationError) -> Self {
        Self {
            error: e.to_string(),
            status: 500,
        }
    }
}

/// Failure reported by a [`crate::storage::KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store refuses access (private mode, permissions).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The value would exceed the backing store's size limit.
    #[error("Storage quota exceeded for key '{key}'")]
    QuotaExceeded { key: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
