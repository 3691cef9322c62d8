//! Optional hosted-model completion behind a swappable trait.
//!
//! The assistant only sees [`CompletionProvider`]; the OpenAI-compatible
//! client below is one implementation. Every failure surfaces as
//! [`AppError::ExternalService`] so callers can fall back.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::error::AppError;
use crate::models::coach::ChatTurn;

pub enum CompletionPrompt {
    /// Ask for a JSON object matching `schema`.
    Structured {
        system: String,
        input: Value,
        schema: Value,
    },
    /// Free-form conversation; the last turn is the user's question.
    Conversation {
        system: String,
        turns: Vec<ChatTurn>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Structured(Value),
    Text(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Value reported in a response's `source` field.
    fn source(&self) -> String;

    async fn complete(&self, prompt: &CompletionPrompt) -> Result<Completion, AppError>;
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, AppError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        Ok(Some(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }))
    }

    fn build_request(&self, prompt: &CompletionPrompt) -> Result<ChatCompletionRequest<'_>> {
        let request = match prompt {
            CompletionPrompt::Structured {
                system,
                input,
                schema,
            } => ChatCompletionRequest {
                model: &self.model,
                messages: vec![
                    Message {
                        role: "system".into(),
                        content: system.clone(),
                    },
                    Message {
                        role: "user".into(),
                        content: serde_json::to_string(input)?,
                    },
                ],
                response_format: Some(json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "coach_response",
                        "strict": true,
                        "schema": schema,
                    }
                })),
            },
            CompletionPrompt::Conversation { system, turns } => {
                let mut messages = vec![Message {
                    role: "system".into(),
                    content: system.clone(),
                }];
                messages.extend(turns.iter().map(|t| Message {
                    role: t.role.clone(),
                    content: t.content.clone(),
                }));
                ChatCompletionRequest {
                    model: &self.model,
                    messages,
                    response_format: None,
                }
            }
        };
        Ok(request)
    }

    async fn send(&self, prompt: &CompletionPrompt) -> Result<Completion> {
        let request = self.build_request(prompt)?;
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion API returned {}: {}", status, body));
        }

        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("completion API returned no content"))?;

        match prompt {
            CompletionPrompt::Structured { .. } => {
                let value = serde_json::from_str(&content)
                    .context("structured completion was not valid JSON")?;
                Ok(Completion::Structured(value))
            }
            CompletionPrompt::Conversation { .. } => Ok(Completion::Text(content)),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn source(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn complete(&self, prompt: &CompletionPrompt) -> Result<Completion, AppError> {
        self.send(prompt)
            .await
            .map_err(|e| AppError::ExternalService(format!("{e:#}")))
    }
}

/// JSON schema for a structured coach response. List lengths are checked
/// by the caller.
pub fn coach_schema() -> Value {
    let strings = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "summary", "sentiment", "risk_profile", "optimization_suggestions",
            "future_bias_triggers", "coaching_prompts"
        ],
        "properties": {
            "summary": {"type": "string"},
            "sentiment": {
                "type": "object",
                "additionalProperties": false,
                "required": ["label", "score", "evidence"],
                "properties": {
                    "label": {"type": "string", "enum": ["positive", "neutral", "negative"]},
                    "score": {"type": "number"},
                    "evidence": {"type": "string"},
                },
            },
            "risk_profile": {
                "type": "object",
                "additionalProperties": false,
                "required": ["score", "tier", "rationale"],
                "properties": {
                    "score": {"type": "number"},
                    "tier": {"type": "string", "enum": ["Aggressive", "Balanced", "Conservative"]},
                    "rationale": {"type": "string"},
                },
            },
            "optimization_suggestions": strings.clone(),
            "future_bias_triggers": strings.clone(),
            "coaching_prompts": strings,
        },
    })
}
