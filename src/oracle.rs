//! Reasoning-oracle seam.
//!
//! The pipeline only depends on [`Oracle`]: a prompt (and optionally a
//! document) goes in, free text and token counters come out. The HTTP
//! implementation talks to the Anthropic Messages API; tests plug in
//! scripted oracles.

use crate::config::OracleConfig;
use crate::error::{Error, Result};
use crate::types::TokenUsage;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A document sent alongside the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAttachment {
    pub media_type: String,
    pub data_base64: String,
}

impl DocumentAttachment {
    pub fn pdf(bytes: &[u8]) -> Self {
        Self {
            media_type: "application/pdf".to_string(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// One oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub prompt: String,
    pub attachment: Option<DocumentAttachment>,
    pub max_tokens: u32,
}

impl OracleRequest {
    pub fn text(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            attachment: None,
            max_tokens,
        }
    }
}

/// Oracle answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// External reasoning service.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: OracleRequest) -> Result<OracleReply>;

    /// Whether attached documents (PDF) are understood.
    fn supports_documents(&self) -> bool {
        true
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "document")]
    Document { source: DocumentSource },
    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Oracle backed by the Anthropic Messages API.
pub struct AnthropicOracle {
    client: reqwest::Client,
    config: OracleConfig,
}

impl AnthropicOracle {
    pub fn new(config: OracleConfig, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| Error::Config("API key contains invalid characters".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Build from configuration, reading the key from the environment.
    pub fn from_config(config: &OracleConfig) -> Result<Self> {
        let key = config.api_key()?;
        Self::new(config.clone(), &key)
    }

    async fn send_once(&self, body: &MessagesRequest<'_>) -> std::result::Result<OracleReply, Attempt> {
        let response = self
            .client
            .post(&self.config.api_url)
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, truncate(&text, 200));
            return Err(if is_retryable(status) {
                Attempt::Retryable(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let data: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Attempt::Fatal(format!("cannot decode response: {}", e)))?;

        let text = data
            .content
            .into_iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text)
            .collect::<String>();
        let usage = data
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(OracleReply { text, usage })
    }
}

enum Attempt {
    Retryable(String),
    Fatal(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * 2u64.pow(attempt.min(5)))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn complete(&self, request: OracleRequest) -> Result<OracleReply> {
        let mut content = Vec::new();
        if let Some(attachment) = request.attachment {
            content.push(ContentBlock::Document {
                source: DocumentSource {
                    source_type: "base64",
                    media_type: attachment.media_type,
                    data: attachment.data_base64,
                },
            });
        }
        content.push(ContentBlock::Text {
            text: request.prompt,
        });

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let mut last_error = String::from("no attempts made");
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt - 1)).await;
            }
            match self.send_once(&body).await {
                Ok(reply) => {
                    log::debug!(
                        "Oracle replied with {} chars ({} in / {} out tokens)",
                        reply.text.len(),
                        reply.usage.input_tokens,
                        reply.usage.output_tokens
                    );
                    return Ok(reply);
                }
                Err(Attempt::Fatal(message)) => return Err(Error::Oracle(message)),
                Err(Attempt::Retryable(message)) => {
                    log::warn!("Oracle attempt {} failed: {}", attempt + 1, message);
                    last_error = message;
                }
            }
        }
        Err(Error::Oracle(last_error))
    }
}
