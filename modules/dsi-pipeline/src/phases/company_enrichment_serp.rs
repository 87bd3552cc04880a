//! §4.6.3: enrich every distinct root domain discovered in SERP results.
//! Skips domains whose profile is already fresh; never fatal at the
//! pipeline level (enrichment is best-effort), only the phase's own
//! completion ratio is tracked.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dsi_common::{CompanyProfile, ContentType, PipelineConfig, PipelineRunId};
use dsi_resilience::retry;
use serde_json::json;

use super::{PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

const PROFILE_TTL_DAYS: i64 = 30;
const COMPLETION_THRESHOLD: f64 = 0.90;

pub struct CompanyEnrichmentSerpWorker;

#[async_trait]
impl PhaseWorker for CompanyEnrichmentSerpWorker {
    async fn run(&self, run_id: PipelineRunId, config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let mut domains = HashSet::new();
        for content_type in [ContentType::Organic, ContentType::News, ContentType::Video] {
            match deps.store.serp_results_for_run(run_id, content_type).await {
                Ok(rows) => domains.extend(rows.into_iter().map(|r| r.domain)),
                Err(e) => return PhaseResult::failed(format!("failed to read serp results: {e}")),
            }
        }

        let total = domains.len();
        let mut enriched = 0usize;

        for domain in &domains {
            if deps.is_cancelled() {
                return PhaseResult::failed("cancelled");
            }

            match deps.store.company_profile_is_fresh(domain, PROFILE_TTL_DAYS).await {
                Ok(true) => {
                    enriched += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, domain, "freshness check failed, re-enriching");
                }
            }

            let outcome = retry(&config.retry, "company_enrichment.lookup", || async {
                deps.company_data
                    .lookup(domain)
                    .await
                    .map_err(|e| dsi_common::PipelineError::TransientExternal {
                        service: "company_data_provider".to_string(),
                        source: e,
                    })
            })
            .await;

            match outcome {
                Ok(Some(profile)) => {
                    if deps.store.upsert_company_profile(&profile).await.is_ok() {
                        enriched += 1;
                    }
                }
                Ok(None) | Err(_) => {
                    // Unreachable domains still get a marker row so later
                    // phases can tell "looked, found nothing" from "never looked".
                    let marker = CompanyProfile {
                        root_domain: domain.clone(),
                        company_name: String::new(),
                        industry: String::new(),
                        size: String::new(),
                        technologies: Vec::new(),
                        parent_company: None,
                        source_type: "unresolved".to_string(),
                        profile_updated_at: Utc::now(),
                    };
                    let _ = deps.store.upsert_company_profile(&marker).await;
                }
            }
        }

        let ratio = if total == 0 { 1.0 } else { enriched as f64 / total as f64 };
        let mut result = PhaseResult::completed(json!({ "domains": total, "enriched": enriched }));
        if ratio < COMPLETION_THRESHOLD {
            result.outcome = super::PhaseOutcome::CompletedPartial;
        }
        result
    }
}
