//! Response schemas for structured card generation.
//!
//! Each [`CardType`] has one JSON schema sent as the `response_format` of
//! the chat request, and one typed shape the parsed payload is decoded into.
//! Both shapes are wrapped in a `{"cards": [...]}` object because the
//! provider only accepts object-rooted schemas.
//!
//! Decoding is lenient about the envelope: a bare array of card objects or
//! a bare array of string rows is accepted too, since that is what older
//! model snapshots return when they ignore the wrapper.

use crate::error::GenerationError;
use crate::output::{CardRow, CardType};
use serde::Deserialize;
use serde_json::{json, Value};

/// Front/back card covering vocabulary, grammar blanks, multiple choice.
#[derive(Debug, Clone, Deserialize)]
pub struct BasicCard {
    pub front: String,
    pub back: String,
}

/// Kanji study card.
#[derive(Debug, Clone, Deserialize)]
pub struct KanjiCard {
    pub kanji: String,
    pub translation: String,
    pub reading: String,
    pub mnemonic: String,
    pub examples: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardEntry {
    Row(Vec<String>),
    Kanji(KanjiCard),
    Basic(BasicCard),
}

impl CardEntry {
    fn into_fields(self) -> Vec<String> {
        match self {
            CardEntry::Row(fields) => fields,
            CardEntry::Kanji(k) => vec![k.kanji, k.translation, k.reading, k.mnemonic, k.examples],
            CardEntry::Basic(b) => vec![b.front, b.back],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardPayload {
    Wrapped { cards: Vec<CardEntry> },
    Bare(Vec<CardEntry>),
}

/// The `response_format` object for `card_type`.
pub fn response_format(card_type: CardType) -> Value {
    let (name, item) = match card_type {
        CardType::Basic => ("basic_cards", object_schema(&["front", "back"])),
        CardType::Kanji => (
            "kanji_cards",
            object_schema(&["kanji", "translation", "reading", "mnemonic", "examples"]),
        ),
    };

    json!({
        "type": "json_schema",
        "json_schema": {
            "name": name,
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "cards": { "type": "array", "items": item }
                },
                "required": ["cards"],
                "additionalProperties": false
            }
        }
    })
}

fn object_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "string" })))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": fields,
        "additionalProperties": false
    })
}

/// Decode a parsed payload into card rows.
///
/// A missing or blank payload (`null`, `{}`, `""`) and an empty deck are
/// reported as [`GenerationError::EmptyResponse`]; a row outside 2..=5
/// fields as [`GenerationError::InvalidPayload`].
pub fn decode_cards(payload: &Value) -> Result<Vec<CardRow>, GenerationError> {
    let blank = match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if blank {
        return Err(GenerationError::EmptyResponse);
    }

    let entries = match CardPayload::deserialize(payload)
        .map_err(|e| GenerationError::InvalidPayload(e.to_string()))?
    {
        CardPayload::Wrapped { cards } => cards,
        CardPayload::Bare(cards) => cards,
    };

    if entries.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let fields = entry.into_fields();
            let len = fields.len();
            CardRow::new(fields).ok_or_else(|| {
                GenerationError::InvalidPayload(format!("card {} has {} fields", i + 1, len))
            })
        })
        .collect()
}
