//! Structured-extraction client for the LLM collaborator used by Content
//! Analysis and the Background Channel Resolver.

pub mod client;
pub mod mock;
pub mod traits;
mod types;

pub use client::ClaudeClient;
pub use mock::MockLlmProvider;
pub use traits::{LlmProvider, Message, MessageRole};
