//! §4.6.6: structured extraction over eligible scraped pages (completed,
//! length > 100 chars, referring domain has a resolved company profile).
//! Single attempt per document with a strict input-length budget.

use async_trait::async_trait;
use dsi_common::{ContentAnalysisRow, PersonaAlignment, PipelineConfig, PipelineRunId, ScrapeStatus};
use dsi_llm_client::Message;
use serde_json::json;
use tokio::sync::Semaphore;

use super::{PhaseOutcome, PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

const MIN_BODY_LEN: usize = 100;
const MAX_INPUT_CHARS: usize = 12_000;

fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "primary_persona": { "type": "string" },
            "persona_scores": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": { "persona": { "type": "string" }, "score": { "type": "number" } },
                    "required": ["persona", "score"]
                }
            },
            "buyer_journey_phase": { "type": "string" },
            "buyer_journey_score": { "type": "number" },
            "content_classification": { "type": "string" },
            "source_type": { "type": "string" },
            "entity_mentions": { "type": "array", "items": { "type": "string" } },
            "sentiment": { "type": "string" }
        },
        "required": [
            "summary", "primary_persona", "persona_scores", "buyer_journey_phase",
            "buyer_journey_score", "content_classification", "source_type",
            "entity_mentions", "sentiment"
        ]
    })
}

pub struct ContentAnalysisWorker;

#[async_trait]
impl PhaseWorker for ContentAnalysisWorker {
    async fn run(&self, run_id: PipelineRunId, config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let scraped = match deps
            .store
            .scraped_content_for_run(run_id, Some(ScrapeStatus::Completed))
            .await
        {
            Ok(rows) => rows,
            Err(e) => return PhaseResult::failed(format!("failed to read scraped content: {e}")),
        };

        let mut eligible = Vec::new();
        for row in scraped {
            if row.body.len() <= MIN_BODY_LEN {
                continue;
            }
            let domain = dsi_common::normalize_domain(&extract_host(&row.url));
            match deps.store.fetch_company_profile(&domain).await {
                Ok(Some(profile)) if !profile.company_name.is_empty() => eligible.push(row),
                _ => continue,
            }
        }

        let total = eligible.len();
        let concurrency = config.concurrency.content_analysis.max(1) as usize;
        let semaphore = std::sync::Arc::new(Semaphore::new(concurrency));
        let mut tasks = Vec::new();

        for row in eligible {
            let semaphore = semaphore.clone();
            let llm = deps.llm.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.unwrap();
                let truncated: String = row.body.chars().take(MAX_INPUT_CHARS).collect();
                let messages = vec![
                    Message::system("Classify the following page content for buyer persona alignment, buyer-journey phase, and sentiment."),
                    Message::user(truncated),
                ];
                let extracted = llm.extract(messages, "content_analysis", analysis_schema()).await;
                (row.url, extracted)
            }));
        }

        let mut analyzed = 0usize;
        for task in tasks {
            let (url, extracted) = match task.await {
                Ok(v) => v,
                Err(_) => continue,
            };
            let value = match extracted {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, url, "content analysis extraction failed");
                    continue;
                }
            };
            let row = match parse_analysis_row(run_id, &url, value) {
                Some(r) => r,
                None => continue,
            };
            if deps.store.upsert_content_analysis(&row).await.is_ok() {
                analyzed += 1;
            }
        }

        let outcome = if analyzed >= total {
            PhaseOutcome::Completed
        } else {
            PhaseOutcome::CompletedPartial
        };

        PhaseResult {
            outcome,
            result: json!({ "total": total, "analyzed": analyzed }),
            error: None,
        }
    }
}

fn parse_analysis_row(run_id: PipelineRunId, url: &str, value: serde_json::Value) -> Option<ContentAnalysisRow> {
    let persona_scores: Vec<PersonaAlignment> =
        serde_json::from_value(value.get("persona_scores")?.clone()).unwrap_or_default();
    let entity_mentions: Vec<String> =
        serde_json::from_value(value.get("entity_mentions")?.clone()).unwrap_or_default();
    Some(ContentAnalysisRow {
        pipeline_run_id: run_id,
        url: url.to_string(),
        summary: value.get("summary")?.as_str()?.to_string(),
        primary_persona: value.get("primary_persona")?.as_str()?.to_string(),
        persona_scores,
        buyer_journey_phase: value.get("buyer_journey_phase")?.as_str()?.to_string(),
        buyer_journey_score: value.get("buyer_journey_score")?.as_f64()?,
        content_classification: value.get("content_classification")?.as_str()?.to_string(),
        source_type: value.get("source_type")?.as_str()?.to_string(),
        entity_mentions,
        sentiment: value.get("sentiment")?.as_str()?.to_string(),
    })
}

fn extract_host(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}
