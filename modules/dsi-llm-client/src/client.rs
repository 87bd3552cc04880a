use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use crate::traits::{LlmProvider, Message, MessageRole};
use crate::types::{ChatRequest, ChatResponse, ContentBlock, ToolDefinitionWire, WireMessage, Role};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude-backed `LlmProvider`. Structured extraction is always done via a
/// forced tool call so callers get parseable JSON back, never prose.
pub struct ClaudeClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "claude extraction request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(anyhow!("Claude API error ({status}): {body}"));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmProvider for ClaudeClient {
    async fn extract(
        &self,
        messages: Vec<Message>,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value> {
        let mut system = None;
        let mut wire_messages = Vec::new();
        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    system = Some(match system {
                        Some(existing) => format!("{existing}\n\n{}", msg.content),
                        None => msg.content,
                    });
                }
                MessageRole::User => wire_messages.push(WireMessage {
                    role: Role::User,
                    content: msg.content,
                }),
            }
        }

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: 4096,
            messages: wire_messages,
            system,
            temperature: 0.0,
            tools: vec![ToolDefinitionWire {
                name: schema_name.to_string(),
                description: "Extract structured data from the input.".to_string(),
                input_schema: schema,
            }],
            tool_choice: serde_json::json!({ "type": "tool", "name": schema_name }),
        };

        let response = self.chat(&request).await?;

        for block in response.content {
            if let ContentBlock::ToolUse { input } = block {
                return Ok(input);
            }
        }

        Err(anyhow!("no structured tool-use block in Claude response"))
    }
}
