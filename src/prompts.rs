//! Prompt builders for card generation and the chat tutor.
//!
//! Centralising every prompt here keeps the pipeline modules free of
//! wording: the card client and the tutor only decide *when* to call the
//! model, never *what* to say to it. Unit tests inspect the prompts directly
//! without a provider.

use crate::chat::ChatSession;
use crate::output::{CardType, GenerationRequest};

/// System instruction for card generation.
pub fn card_system_prompt(request: &GenerationRequest) -> String {
    let n = request.number_of_cards;
    let level = &request.level;

    match request.card_type {
        CardType::Basic => {
            let mut rules = vec![
                "You create basic Anki flashcards for learners of Japanese.".to_string(),
                "Keep every word written in KATAKANA or HIRAGANA as it appears; never translate katakana words when it can be avoided, and never invent katakana words.".to_string(),
                "Answer in Japanese or French.".to_string(),
                format!(
                    "Generate exactly {n} cards {}.",
                    if request.romanji {
                        "including romaji"
                    } else {
                        "without romaji"
                    }
                ),
            ];

            if request.kanji {
                let mut line = "You may use kanji when the source contains them".to_string();
                if request.furigana {
                    line.push_str(", with furigana written like this: 漢字 [かんじ]");
                }
                line.push('.');
                rules.push(line);
            } else {
                rules.push("Do not use kanji.".to_string());
            }

            rules.push(format!(
                "Cards may be fill-in-the-blank sentences, multiple choice questions, grammar exercises, words to guess, sentences, expressions or difficult words, always matching level {level}."
            ));

            if request.all_japanese {
                rules.push(
                    "Write every statement, question and answer in Japanese. NO FRENCH.".to_string(),
                );
            }

            rules.push(format!("The learner's Japanese level is {level}."));

            rules
                .iter()
                .map(|r| format!("-> {r}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
        CardType::Kanji => format!(
            "You create Anki flashcards for learning Japanese kanji, using words in KANJI and HIRAGANA; KATAKANA words are FORBIDDEN. Generate exactly {n} cards for level {level}. Each card gives the kanji, its translation, its reading, a mnemonic and example sentences."
        ),
    }
}

/// User instruction for card generation: the source material.
pub fn card_user_prompt(request: &GenerationRequest) -> String {
    let mut parts = Vec::new();

    if request.card_type == CardType::Kanji {
        parts.push(
            "Make cards with words in KANJI and HIRAGANA to learn kanji. KATAKANA is forbidden."
                .to_string(),
        );
    }

    if let Some(extracted) = request.text_from_pdf.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!(
            "Here is the text extracted from the uploaded PDF or image to build the cards from: {extracted}."
        ));
    }

    if let Some(text) = request.text.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!(
            "Here is the text from the form to build the cards from, with the instructions: {text}."
        ));
    }

    parts.join("\n")
}

/// System instruction for the chat tutor.
pub fn tutor_system_prompt(session: &ChatSession) -> String {
    format!(
        "You are a patient Japanese teacher. Reply naturally and conversationally.\n\
         -> Answer in Japanese or French.\n\
         -> Run {} exercises; keep them short and clearly presented.\n\
         -> The learner's Japanese level is {}.\n\
         -> The learner's name is {}.",
        session.exercise_type, session.level, session.name
    )
}
