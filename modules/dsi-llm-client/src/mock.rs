use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::traits::{LlmProvider, Message};

/// Returns a fixed sequence of canned responses, one per call, for tests.
/// Panics if called more times than responses were queued.
pub struct MockLlmProvider {
    responses: Mutex<Vec<Value>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn extract(&self, _messages: Vec<Message>, _schema_name: &str, _schema: Value) -> anyhow::Result<Value> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(anyhow::anyhow!("MockLlmProvider exhausted"));
        }
        Ok(responses.remove(0))
    }
}
