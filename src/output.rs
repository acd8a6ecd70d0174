//! Request and result types of one card-generation submission.

use crate::error::{AnkiForgeError, GenerationFailure};
use crate::pipeline::input::FileHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest deck a single submission may ask for.
pub const MAX_CARDS_PER_REQUEST: u8 = 15;

/// Which response schema the model is asked to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    /// Two fields: front / back.
    #[default]
    #[serde(alias = "basique")]
    Basic,
    /// Five fields: kanji, translation, reading, mnemonic, examples.
    Kanji,
}

impl CardType {
    /// Number of fields in every row of this card type.
    pub fn field_count(self) -> usize {
        match self {
            CardType::Basic => 2,
            CardType::Kanji => 5,
        }
    }

    /// Column headers, in row order.
    pub fn headers(self) -> &'static [&'static str] {
        match self {
            CardType::Basic => &["front", "back"],
            CardType::Kanji => &["kanji", "translation", "reading", "mnemonic", "examples"],
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardType::Basic => f.write_str("basic"),
            CardType::Kanji => f.write_str("kanji"),
        }
    }
}

impl FromStr for CardType {
    type Err = AnkiForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "basique" => Ok(CardType::Basic),
            "kanji" => Ok(CardType::Kanji),
            other => Err(AnkiForgeError::InvalidConfig(format!(
                "unknown card type '{other}' (expected basic or kanji)"
            ))),
        }
    }
}

/// One flashcard: 2 to 5 ordered text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardRow(Vec<String>);

impl CardRow {
    pub const MIN_FIELDS: usize = 2;
    pub const MAX_FIELDS: usize = 5;

    /// Wrap `fields`, or `None` when the count is outside 2..=5.
    pub fn new(fields: Vec<String>) -> Option<Self> {
        (Self::MIN_FIELDS..=Self::MAX_FIELDS)
            .contains(&fields.len())
            .then_some(Self(fields))
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn into_fields(self) -> Vec<String> {
        self.0
    }
}

impl<const N: usize> From<[&str; N]> for CardRow {
    fn from(fields: [&str; N]) -> Self {
        Self(fields.iter().map(|f| f.to_string()).collect())
    }
}

/// Everything a user submits from the card form.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Free text typed by the user.
    pub text: Option<String>,
    /// Text extracted from the attached file; filled in by the orchestrator.
    pub text_from_pdf: Option<String>,
    /// JLPT-style level label, e.g. "N5".
    pub level: String,
    pub card_type: CardType,
    /// 1..=15.
    pub number_of_cards: u8,
    pub romanji: bool,
    pub kanji: bool,
    pub furigana: bool,
    /// Write prompts and answers entirely in Japanese.
    pub all_japanese: bool,
    /// Uploaded files; only the first one is processed.
    pub files: Vec<FileHandle>,
}

impl GenerationRequest {
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            request: GenerationRequest {
                level: "N5".to_string(),
                number_of_cards: 5,
                ..Default::default()
            },
        }
    }

    /// The file that will be sent to OCR, if any.
    pub fn first_file(&self) -> Option<&FileHandle> {
        self.files.first()
    }

    /// A request needs typed text or a file before it may be submitted.
    pub fn is_submittable(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) || !self.files.is_empty()
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug)]
pub struct GenerationRequestBuilder {
    request: GenerationRequest,
}

impl GenerationRequestBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.request.text = Some(text.into());
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.request.level = level.into();
        self
    }

    pub fn card_type(mut self, card_type: CardType) -> Self {
        self.request.card_type = card_type;
        self
    }

    pub fn number_of_cards(mut self, n: u8) -> Self {
        self.request.number_of_cards = n;
        self
    }

    pub fn romanji(mut self, v: bool) -> Self {
        self.request.romanji = v;
        self
    }

    pub fn kanji(mut self, v: bool) -> Self {
        self.request.kanji = v;
        self
    }

    pub fn furigana(mut self, v: bool) -> Self {
        self.request.furigana = v;
        self
    }

    pub fn all_japanese(mut self, v: bool) -> Self {
        self.request.all_japanese = v;
        self
    }

    pub fn file(mut self, file: FileHandle) -> Self {
        self.request.files.push(file);
        self
    }

    pub fn build(self) -> Result<GenerationRequest, AnkiForgeError> {
        let n = self.request.number_of_cards;
        if !(1..=MAX_CARDS_PER_REQUEST).contains(&n) {
            return Err(AnkiForgeError::InvalidConfig(format!(
                "number of cards must be 1–{MAX_CARDS_PER_REQUEST}, got {n}"
            )));
        }
        if self.request.level.trim().is_empty() {
            return Err(AnkiForgeError::InvalidConfig("level must not be empty".into()));
        }
        Ok(self.request)
    }
}

/// Terminal value of one submission, handed to the outcome notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub data: Option<Vec<CardRow>>,
    /// 200 on success, 500 on failure.
    pub status: u16,
    pub error: Option<String>,
    pub card_type: Option<CardType>,
}

impl GenerationOutcome {
    pub fn success(rows: Vec<CardRow>, card_type: CardType) -> Self {
        Self {
            data: Some(rows),
            status: 200,
            error: None,
            card_type: Some(card_type),
        }
    }

    pub fn failure(failure: GenerationFailure) -> Self {
        Self {
            data: None,
            status: failure.status,
            error: Some(failure.error),
            card_type: None,
        }
    }

    pub fn from_result(result: Result<Vec<CardRow>, GenerationFailure>, card_type: CardType) -> Self {
        match result {
            Ok(rows) => Self::success(rows, card_type),
            Err(failure) => Self::failure(failure),
        }
    }
}
