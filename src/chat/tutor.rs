//! Tutor replies from the chat model.
//!
//! ## Message Layout
//!
//! 1. **System message**: tutor persona with exercise type, level and name
//! 2. **Context**: the last `chat_context_turns` user/assistant messages of
//!    the history, oldest first
//! 3. **User message**: the new message
//!
//! [`ChatTutor::reply`] never fails. When the model cannot be reached the
//! learner gets an apologetic assistant message instead, distinguishing a
//! rate-limited service from any other failure.

use crate::chat::{ChatMessage, ChatSession};
use crate::config::GenerationConfig;
use crate::error::ProviderError;
use crate::prompts::tutor_system_prompt;
use crate::provider::{ChatRequest, CompletionProvider, MessageRole, PromptMessage};
use crate::retry::{is_rate_limited, retry_with_backoff};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Reply when the provider is still rate-limiting after every retry.
pub const OVERLOADED_REPLY: &str =
    "Sorry, the service is temporarily overloaded. Please try again in a few moments.";
/// Reply for any other failure.
pub const FAILURE_REPLY: &str =
    "An error occurred while fetching the reply. Please try again.";

#[derive(Clone)]
pub struct ChatTutor {
    provider: Arc<dyn CompletionProvider>,
    config: GenerationConfig,
}

impl ChatTutor {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// The assistant's answer to `message`.
    pub async fn reply(
        &self,
        message: &str,
        history: &[ChatMessage],
        session: &ChatSession,
    ) -> ChatMessage {
        let request = self.build_request(message, history, session);

        let text = match retry_with_backoff(&self.config.retry, is_rate_limited, || {
            self.provider.chat(&request)
        })
        .await
        {
            Ok(response) => match response.first_content() {
                Some(content) if !content.trim().is_empty() => content.to_string(),
                _ => {
                    error!("Tutor reply was empty");
                    FAILURE_REPLY.to_string()
                }
            },
            Err(e) => fallback_reply(&e).to_string(),
        };

        ChatMessage::assistant(text).with_id(Uuid::new_v4().to_string())
    }

    fn build_request(&self, message: &str, history: &[ChatMessage], session: &ChatSession) -> ChatRequest {
        let turns: Vec<&ChatMessage> = history.iter().filter(|m| m.is_turn()).collect();
        let context = &turns[turns.len().saturating_sub(self.config.chat_context_turns)..];
        debug!("Tutor request with {} context messages", context.len());

        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(PromptMessage::system(tutor_system_prompt(session)));
        messages.extend(context.iter().map(|m| match m.role {
            MessageRole::Assistant => PromptMessage::assistant(m.message.clone()),
            _ => PromptMessage::user(m.message.clone()),
        }));
        messages.push(PromptMessage::user(message));

        ChatRequest {
            model: self.config.generation_model.clone(),
            temperature: self.config.chat_temperature,
            messages,
            response_format: None,
            max_tokens: self.config.chat_max_tokens,
        }
    }
}

fn fallback_reply(e: &ProviderError) -> &'static str {
    error!("Error talking to the tutor model: {e}");
    if is_rate_limited(e) {
        OVERLOADED_REPLY
    } else {
        FAILURE_REPLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, Choice, ChoiceMessage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        result: Result<ChatResponse, ProviderError>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl CompletionProvider for Recording {
        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().push(request.clone());
            self.result.clone()
        }
    }

    fn tutor(result: Result<ChatResponse, ProviderError>) -> (ChatTutor, Arc<Recording>) {
        let provider = Arc::new(Recording {
            result,
            seen: Mutex::new(Vec::new()),
        });
        (ChatTutor::new(provider.clone(), GenerationConfig::default()), provider)
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(text.into()),
                    parsed: None,
                },
            }],
        }
    }

    #[tokio::test]
    async fn context_is_last_four_turns() {
        let (tutor, provider) = tutor(Ok(answer("はい")));
        let mut history: Vec<ChatMessage> = (0..6)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("u{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect();
        history.push(ChatMessage::new(MessageRole::System, "hidden"));

        let reply = tutor.reply("next", &history, &ChatSession::default()).await;
        assert_eq!(reply.message, "はい");
        assert_eq!(reply.role, MessageRole::Assistant);
        assert!(reply.id.is_some());

        let seen = provider.seen.lock().unwrap();
        let msgs = &seen[0].messages;
        assert_eq!(msgs.len(), 6);
        assert_eq!(msgs[0].role, MessageRole::System);
        assert_eq!(msgs[1].content, "u2");
        assert_eq!(msgs[4].content, "a5");
        assert_eq!(msgs[5].content, "next");
        assert_eq!(seen[0].temperature, 0.3);
        assert_eq!(seen[0].max_tokens, 500);
        assert!(seen[0].response_format.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_gives_overloaded_reply() {
        let (tutor, provider) = tutor(Err(ProviderError::rate_limited("busy")));
        let reply = tutor.reply("hi", &[], &ChatSession::default()).await;
        assert_eq!(reply.message, OVERLOADED_REPLY);
        assert_eq!(provider.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn other_errors_give_generic_reply() {
        let (tutor, provider) = tutor(Err(ProviderError::http(500, "boom")));
        let reply = tutor.reply("hi", &[], &ChatSession::default()).await;
        assert_eq!(reply.message, FAILURE_REPLY);
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }
}
