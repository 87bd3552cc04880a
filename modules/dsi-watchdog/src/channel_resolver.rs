//! Background Channel→Company Resolver (§4.10). Independent from the
//! per-run pipeline: it sweeps channel ids any run's video enrichment has
//! seen but that still lack a usable company-domain mapping, and resolves
//! them via a single LLM extraction call over the channel's title and
//! description. Every sweep always writes a mapping row for a channel it
//! looked at, even when resolution fails — an empty domain tagged
//! `no_domain_found` or `extraction_error` is a legitimate terminal state,
//! not an error the caller needs to retry forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dsi_common::normalize_domain;
use dsi_llm_client::{LlmProvider, Message};
use dsi_store::StateStore;
use serde_json::json;

const DEFAULT_BATCH_SIZE: i64 = 20;
const MAX_DESCRIPTION_CHARS: usize = 2_000;

#[derive(Debug, Clone, Default)]
pub struct ChannelInfo {
    pub title: String,
    pub description: String,
}

/// Fetches channel title/description for the resolver's LLM prompt. Kept
/// separate from `VideoDataProvider` in the pipeline crate: the resolver
/// runs out of band from any single pipeline run and only needs this one
/// narrow capability.
#[async_trait]
pub trait ChannelInfoProvider: Send + Sync {
    async fn fetch(&self, channel_id: &str) -> anyhow::Result<ChannelInfo>;
}

pub struct MockChannelInfoProvider {
    pub channels: Mutex<HashMap<String, ChannelInfo>>,
}

impl MockChannelInfoProvider {
    pub fn new() -> Self {
        Self { channels: Mutex::new(HashMap::new()) }
    }
}

impl Default for MockChannelInfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelInfoProvider for MockChannelInfoProvider {
    async fn fetch(&self, channel_id: &str) -> anyhow::Result<ChannelInfo> {
        self.channels
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no channel info for {channel_id}"))
    }
}

fn extraction_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "root_domain": { "type": "string", "description": "the company's root domain, or empty if none can be inferred" }
        },
        "required": ["root_domain"]
    })
}

#[derive(Debug, Clone, Default)]
pub struct ResolverReport {
    pub attempted: usize,
    pub resolved: usize,
    pub no_domain: usize,
    pub errored: usize,
}

pub struct ChannelResolver {
    store: StateStore,
    llm: Arc<dyn LlmProvider>,
    channels: Arc<dyn ChannelInfoProvider>,
    batch_size: i64,
    max_attempts: i32,
}

impl ChannelResolver {
    pub fn new(
        store: StateStore,
        llm: Arc<dyn LlmProvider>,
        channels: Arc<dyn ChannelInfoProvider>,
        max_attempts: i32,
    ) -> Self {
        Self { store, llm, channels, batch_size: DEFAULT_BATCH_SIZE, max_attempts }
    }

    pub async fn sweep(&self) -> ResolverReport {
        let mut report = ResolverReport::default();

        let channel_ids = match self.store.unresolved_channel_ids(self.max_attempts, self.batch_size).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list unresolved channels");
                return report;
            }
        };

        for channel_id in channel_ids {
            report.attempted += 1;
            match self.resolve_one(&channel_id).await {
                Ok(Outcome::Resolved) => report.resolved += 1,
                Ok(Outcome::NoDomain) => report.no_domain += 1,
                Ok(Outcome::RetryScheduled) => {}
                Ok(Outcome::Errored) => report.errored += 1,
                Err(e) => tracing::warn!(error = %e, channel_id, "channel resolution attempt failed"),
            }
        }

        report
    }

    async fn resolve_one(&self, channel_id: &str) -> anyhow::Result<Outcome> {
        let info = match self.channels.fetch(channel_id).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, channel_id, "channel info lookup failed");
                return self.bump_or_mark_errored(channel_id).await;
            }
        };

        let description: String = info.description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        let messages = vec![
            Message::system(
                "Given a YouTube channel's title and description, infer the company it belongs \
                 to and return its root domain. Return an empty string if none can be inferred.",
            ),
            Message::user(format!("Title: {}\nDescription: {}", info.title, description)),
        ];

        let extracted = match self.llm.extract(messages, "channel_domain", extraction_schema()).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, channel_id, "channel domain extraction failed");
                return self.bump_or_mark_errored(channel_id).await;
            }
        };

        let domain = extracted.get("root_domain").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
        if domain.is_empty() {
            self.store.upsert_channel_mapping(channel_id, "", "no_domain_found").await?;
            Ok(Outcome::NoDomain)
        } else {
            self.store
                .upsert_channel_mapping(channel_id, &normalize_domain(&domain), "llm_extracted")
                .await?;
            Ok(Outcome::Resolved)
        }
    }

    /// A failed lookup or extraction still needs a durable outcome: bump the
    /// attempt counter, and once the ceiling is hit, write the terminal
    /// `extraction_error` marker so the channel stops being re-selected.
    async fn bump_or_mark_errored(&self, channel_id: &str) -> anyhow::Result<Outcome> {
        self.store.bump_channel_resolution_attempt(channel_id).await?;
        let attempts = self
            .store
            .fetch_channel_mapping(channel_id)
            .await?
            .map(|m| m.attempt_count)
            .unwrap_or(0);
        if attempts >= self.max_attempts {
            self.store.upsert_channel_mapping(channel_id, "", "extraction_error").await?;
            Ok(Outcome::Errored)
        } else {
            Ok(Outcome::RetryScheduled)
        }
    }
}

enum Outcome {
    Resolved,
    NoDomain,
    RetryScheduled,
    Errored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_not_found_for_unknown_channel() {
        let provider = MockChannelInfoProvider::new();
        let result = provider.fetch("unknown").await;
        assert!(result.is_err());
    }
}
