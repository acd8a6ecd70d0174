//! External capabilities: OCR and chat completion.
//!
//! The pipeline talks to the model provider only through the two traits in
//! this module, held as `Arc<dyn …>`. [`MistralClient`] implements both over
//! the Mistral REST API; tests plug in scripted providers instead.
//!
//! ## Error signal
//!
//! Every failure is a [`ProviderError`]. Non-2xx responses keep their HTTP
//! status, which is what the backoff executor inspects: a 429 from either
//! endpoint is retried, everything else fails fast.

use crate::config::ClientConfig;
use crate::error::{AnkiForgeError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

// ── Wire types: OCR ──────────────────────────────────────────────────────────

/// Document payload of an OCR request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OcrDocument {
    DocumentUrl { document_url: String },
    ImageUrl { image_url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: OcrDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_image_base64: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub markdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

// ── Wire types: chat ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<PromptMessage>,
    /// JSON-schema response format; when set the provider fills
    /// [`ChoiceMessage::parsed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Structured payload decoded from `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text content of the first choice.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }

    /// Structured payload of the first choice.
    pub fn first_parsed(&self) -> Option<&serde_json::Value> {
        self.choices.first()?.message.parsed.as_ref()
    }
}

// ── Capability traits ────────────────────────────────────────────────────────

/// Extracts markdown text from a document or image.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn ocr(&self, request: &OcrRequest) -> Result<OcrResponse, ProviderError>;
}

/// Chat completion, optionally constrained by a response schema.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// ── Mistral implementation ───────────────────────────────────────────────────

/// Mistral REST client implementing both capabilities.
///
/// Build it once at start-up with [`MistralClient::new`] and share it as an
/// `Arc`; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct MistralClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MistralClient {
    /// Create a client from a configuration, validating the API key.
    pub fn new(config: &ClientConfig) -> Result<Self, AnkiForgeError> {
        let api_key = config.validate()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnkiForgeError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::other(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            return Err(ProviderError::http(
                status.as_u16(),
                format!("Mistral API error {status}: {detail}"),
            ));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::other(format!("invalid response from {path}: {e}")))
    }
}

#[async_trait]
impl OcrProvider for MistralClient {
    async fn ocr(&self, request: &OcrRequest) -> Result<OcrResponse, ProviderError> {
        let response: OcrResponse = self.post_json("/v1/ocr", request).await?;
        debug!("OCR returned {} pages", response.pages.len());
        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for MistralClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut response: ChatResponse = self.post_json("/v1/chat/completions", request).await?;
        if request.response_format.is_some() {
            attach_parsed(&mut response);
        }
        Ok(response)
    }
}

/// Decode each choice's JSON content into `parsed`.
///
/// Content that is not valid JSON leaves `parsed` empty; the card client
/// reports that as an unparsable response.
pub fn attach_parsed(response: &mut ChatResponse) {
    for choice in &mut response.choices {
        if choice.message.parsed.is_none() {
            choice.message.parsed = choice
                .message
                .content
                .as_deref()
                .and_then(|c| serde_json::from_str(c).ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ocr_request_wire_format_pdf() {
        let req = OcrRequest {
            model: "mistral-ocr-latest".into(),
            document: OcrDocument::DocumentUrl {
                document_url: "data:application/pdf;base64,AA==".into(),
            },
            include_image_base64: Some(false),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "model": "mistral-ocr-latest",
                "document": {"type": "document_url", "document_url": "data:application/pdf;base64,AA=="},
                "include_image_base64": false
            })
        );
    }

    #[test]
    fn ocr_request_wire_format_image() {
        let req = OcrRequest {
            model: "m".into(),
            document: OcrDocument::ImageUrl {
                image_url: "data:image/png;base64,AA==".into(),
            },
            include_image_base64: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["document"]["type"], "image_url");
        assert!(v.get("include_image_base64").is_none());
    }

    #[test]
    fn chat_response_decodes_without_parsed() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"cards\":[]}"}}]}"#;
        let mut resp: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.first_parsed().is_none());
        attach_parsed(&mut resp);
        assert_eq!(resp.first_parsed(), Some(&json!({"cards": []})));
    }

    #[test]
    fn attach_parsed_ignores_non_json() {
        let mut resp = ChatResponse {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some("sorry, I cannot".into()),
                    parsed: None,
                },
            }],
        };
        attach_parsed(&mut resp);
        assert!(resp.first_parsed().is_none());
        assert_eq!(resp.first_content(), Some("sorry, I cannot"));
    }

    #[test]
    fn client_requires_valid_key() {
        assert!(MistralClient::new(&ClientConfig::default()).is_err());
        let config = ClientConfig::default().with_api_key("k".repeat(40));
        assert!(MistralClient::new(&config).is_ok());
    }
}
