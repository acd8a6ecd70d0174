//! Card generation: build a schema-constrained chat request from the
//! submission and decode the structured response into card rows.
//!
//! This module is intentionally thin: the wording lives in
//! [`crate::prompts`] and the schemas in [`crate::schema`], so changing
//! either never touches retry or error handling here.
//!
//! ## Failure Contract
//!
//! [`CardClient::parse`] never panics and never returns a provider error
//! directly. Every failure (provider error after retries, empty choice,
//! payload that does not match the schema) is logged and converted into a
//! [`GenerationFailure`] with status 500, which the orchestrator passes to
//! the outcome notifier as data.

use crate::config::GenerationConfig;
use crate::error::{GenerationError, GenerationFailure};
use crate::output::{CardRow, GenerationRequest};
use crate::prompts::{card_system_prompt, card_user_prompt};
use crate::provider::{ChatRequest, CompletionProvider, PromptMessage};
use crate::retry::{is_rate_limited, retry_with_backoff};
use crate::schema::{decode_cards, response_format};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

#[derive(Clone)]
pub struct CardClient {
    provider: Arc<dyn CompletionProvider>,
    config: GenerationConfig,
}

impl CardClient {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// Generate cards for `request`.
    pub async fn parse(&self, request: &GenerationRequest) -> Result<Vec<CardRow>, GenerationFailure> {
        self.try_parse(request).await.map_err(|e| {
            error!("Error generating {} cards: {e}", request.card_type);
            GenerationFailure::from(e)
        })
    }

    async fn try_parse(&self, request: &GenerationRequest) -> Result<Vec<CardRow>, GenerationError> {
        let start = Instant::now();
        let chat = build_request(request, &self.config);

        let response = retry_with_backoff(&self.config.retry, is_rate_limited, || {
            self.provider.chat(&chat)
        })
        .await?;

        let payload = response.first_parsed().ok_or(GenerationError::EmptyResponse)?;
        let rows = decode_cards(payload)?;

        debug!(
            "Generated {} {} cards in {:?}",
            rows.len(),
            request.card_type,
            start.elapsed()
        );
        Ok(rows)
    }
}

/// Build the chat request for one submission.
///
/// ## Message Layout
///
/// 1. **System message**: card-type rules, level, count and writing flags
/// 2. **User message**: the extracted file text and the typed text
fn build_request(request: &GenerationRequest, config: &GenerationConfig) -> ChatRequest {
    ChatRequest {
        model: config.generation_model.clone(),
        temperature: config.temperature,
        messages: vec![
            PromptMessage::system(card_system_prompt(request)),
            PromptMessage::user(card_user_prompt(request)),
        ],
        response_format: Some(response_format(request.card_type)),
        max_tokens: config.max_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::output::CardType;
    use crate::provider::{ChatResponse, Choice, ChoiceMessage, MessageRole};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        result: Result<ChatResponse, ProviderError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for Fixed {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn parsed(value: serde_json::Value) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(value.to_string()),
                    parsed: Some(value),
                },
            }],
        }
    }

    fn client(result: Result<ChatResponse, ProviderError>) -> (CardClient, Arc<Fixed>) {
        let provider = Arc::new(Fixed {
            result,
            calls: AtomicUsize::new(0),
        });
        (CardClient::new(provider.clone(), GenerationConfig::default()), provider)
    }

    fn request() -> GenerationRequest {
        GenerationRequest::builder().text("テスト").build().unwrap()
    }

    #[test]
    fn build_request_defaults() {
        let config = GenerationConfig::default();
        let mut req = request();
        req.card_type = CardType::Kanji;
        let chat = build_request(&req, &config);
        assert_eq!(chat.temperature, 0.2);
        assert_eq!(chat.max_tokens, 10_000);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, MessageRole::System);
        assert_eq!(chat.messages[1].role, MessageRole::User);
        assert_eq!(
            chat.response_format.unwrap()["json_schema"]["name"],
            "kanji_cards"
        );
    }

    #[tokio::test]
    async fn rows_are_decoded() {
        let (cc, provider) = client(Ok(parsed(json!([["Q", "A"]]))));
        let rows = cc.parse(&request()).await.unwrap();
        assert_eq!(rows, vec![CardRow::from(["Q", "A"])]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_payload_is_500() {
        let (cc, _) = client(Ok(ChatResponse::default()));
        let failure = cc.parse(&request()).await.unwrap_err();
        assert_eq!(failure.status, 500);
        assert!(failure.error.contains("empty"));
    }

    #[tokio::test]
    async fn provider_error_message_is_kept() {
        let (cc, provider) = client(Err(ProviderError::http(401, "Unauthorized")));
        let failure = cc.parse(&request()).await.unwrap_err();
        assert_eq!(failure.error, "Unauthorized");
        assert_eq!(failure.status, 500);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_then_reported() {
        let (cc, provider) = client(Err(ProviderError::rate_limited("Too many requests")));
        let failure = cc.parse(&request()).await.unwrap_err();
        assert_eq!(failure.error, "Too many requests");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }
}
