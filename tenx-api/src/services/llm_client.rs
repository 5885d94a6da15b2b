//! OpenAI-compatible chat completion client
//!
//! Used by AI-assisted imports to reword generated card titles and
//! descriptions. Any failure here is recoverable: callers keep the heuristic
//! text.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tenx_common::config::LlmConfig;
use thiserror::Error;

use super::card_generator::{truncate_chars, CardDraft};

const SYSTEM_PROMPT: &str = "You write catalogue entries for developer learning cards. \
Reply with a JSON object {\"title\": string, \"description\": string}. \
The title has at most 80 characters. The description has at most 3 sentences \
and explains what the code demonstrates.";

/// LLM client errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("LLM is not configured")]
    NotConfigured,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Title and description suggested for a card
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardText {
    pub title: String,
    pub description: String,
}

/// Chat completion client
#[derive(Clone)]
pub struct LlmClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    max_content_chars: usize,
}

impl LlmClient {
    /// Client for a configured LLM, `Err(NotConfigured)` otherwise
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = match (&config.api_key, config.is_configured()) {
            (Some(key), true) => key.trim().to_string(),
            _ => return Err(LlmError::NotConfigured),
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_content_chars: config.max_content_chars,
        })
    }

    /// Ask the model for a title and description of `draft`
    pub async fn describe_card(&self, repo_name: &str, draft: &CardDraft) -> Result<CardText, LlmError> {
        let user_prompt = format!(
            "Repository: {}\nTechnology: {}\nLanguage: {}\nCurrent title: {}\n\nSource:\n{}",
            repo_name,
            draft.tech,
            draft.language,
            draft.title,
            draft.source_excerpt(self.max_content_chars)
        );

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(status.as_u16(), truncate_chars(&body, 200)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))?;

        parse_card_text(&content)
    }
}

/// Parse the model reply, tolerating a fenced code block around the JSON
pub fn parse_card_text(content: &str) -> Result<CardText, LlmError> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let text: CardText = serde_json::from_str(json).map_err(|e| LlmError::Parse(e.to_string()))?;
    if text.title.trim().is_empty() {
        return Err(LlmError::Parse("empty title".to_string()));
    }
    Ok(CardText {
        title: text.title.trim().to_string(),
        description: text.description.trim().to_string(),
    })
}
