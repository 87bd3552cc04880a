use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
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
}

/// The one capability the pipeline needs from an LLM collaborator: structured
/// extraction against a JSON schema, forced via tool-use so the response is
/// always parseable. Content Analysis and the Channel Resolver are both
/// single-shot extraction calls, so there's no multi-turn or tool-calling
/// surface to expose here.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn extract(
        &self,
        messages: Vec<Message>,
        schema_name: &str,
        schema: Value,
    ) -> anyhow::Result<Value>;
}
