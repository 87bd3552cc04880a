//! §4.6.1: reuse a metric fresher than 24h from cache, otherwise fetch from
//! the search collaborator. Non-fatal on per-keyword failure; fatal if ≥50%
//! fail after retries.

use async_trait::async_trait;
use chrono::Utc;
use dsi_common::{HistoricalKeywordMetric, PipelineConfig, PipelineRunId};
use dsi_resilience::retry;
use serde_json::json;

use super::{PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

pub struct KeywordMetricsWorker;

#[async_trait]
impl PhaseWorker for KeywordMetricsWorker {
    async fn run(&self, _run_id: PipelineRunId, config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for keyword_id in &config.keywords {
            for region in &config.regions {
                if deps.is_cancelled() {
                    return PhaseResult::failed("cancelled");
                }
                attempted += 1;

                if let Some(cached) = deps.keyword_cache.get(keyword_id, region) {
                    let _ = cached;
                    continue;
                }

                let outcome = retry(&config.retry, "keyword_metrics.fetch", || async {
                    deps.search
                        .keyword_metrics(keyword_id, region)
                        .await
                        .map_err(|e| dsi_common::PipelineError::TransientExternal {
                            service: "keyword_data_provider".to_string(),
                            source: e,
                        })
                })
                .await;

                match outcome {
                    Ok(Some(metric)) => {
                        if let Err(e) = deps.store.upsert_keyword_metric(&metric).await {
                            tracing::warn!(error = %e, keyword_id, "failed to persist keyword metric");
                            failed += 1;
                            continue;
                        }
                        deps.keyword_cache.put(keyword_id, region, metric);
                    }
                    Ok(None) => {
                        // Recorded "no-data" marker: a zero-search snapshot row
                        // still counts the (keyword, region) pair as attempted.
                        let marker = HistoricalKeywordMetric {
                            snapshot_date: Utc::now().date_naive(),
                            keyword_id: keyword_id.clone(),
                            country: region.clone(),
                            source: "no_data".to_string(),
                            avg_monthly_searches: 0,
                            competition_level: String::new(),
                            bid_low_cents: 0,
                            bid_high_cents: 0,
                        };
                        let _ = deps.store.upsert_keyword_metric(&marker).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, keyword_id, region, "keyword metric fetch failed");
                        failed += 1;
                    }
                }
            }
        }

        if attempted > 0 && failed * 2 >= attempted {
            return PhaseResult::failed(format!("{failed}/{attempted} keyword-metric fetches failed"));
        }

        PhaseResult::completed(json!({ "attempted": attempted, "failed": failed }))
    }
}
