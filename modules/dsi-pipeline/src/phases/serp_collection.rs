//! §4.6.2: collects SERP rows for the (keyword × region × content-type)
//! grid. The batch/webhook path is driven externally by the SERP Batch
//! Coordinator (`dsi-coordinator`) before the pipeline run even exists; this
//! worker implements the synchronous fallback the orchestrator uses when
//! `webhook_starts_pipeline` is false or no batch artifacts are available.

use async_trait::async_trait;
use dsi_common::{normalize_domain, PipelineConfig, PipelineRunId, SerpResultRow};
use dsi_resilience::retry;
use serde_json::json;
use tokio::sync::Semaphore;

use super::{PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

pub struct SerpCollectionWorker;

#[async_trait]
impl PhaseWorker for SerpCollectionWorker {
    async fn run(&self, run_id: PipelineRunId, config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let concurrency = config.concurrency.serp_collection.max(1) as usize;
        let semaphore = std::sync::Arc::new(Semaphore::new(concurrency));
        let mut tasks = Vec::new();

        for keyword_id in &config.keywords {
            for region in &config.regions {
                for content_type in config.content_types.iter().copied() {
                    let semaphore = semaphore.clone();
                    let keyword_id = keyword_id.clone();
                    let region = region.clone();
                    let search = deps.search.clone();
                    let retry_defaults = config.retry.clone();
                    tasks.push(tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.unwrap();
                        retry(&retry_defaults, "serp_collection.fetch", || async {
                            search
                                .fetch_serp(&keyword_id, &region, content_type)
                                .await
                                .map_err(|e| dsi_common::PipelineError::TransientExternal {
                                    service: "search_provider".to_string(),
                                    source: e,
                                })
                        })
                        .await
                    }));
                }
            }
        }

        let mut rows = Vec::new();
        let mut failed = 0usize;
        for task in tasks {
            match task.await {
                Ok(Ok(hits)) => {
                    for hit in hits {
                        let domain = extract_domain(&hit.url);
                        rows.push(SerpResultRow {
                            pipeline_run_id: run_id,
                            keyword_id: hit.keyword_id,
                            serp_type: hit.serp_type,
                            position: hit.position,
                            url: hit.url,
                            domain: normalize_domain(&domain),
                            title: hit.title,
                            snippet: hit.snippet,
                            estimated_traffic: hit.estimated_traffic,
                        });
                    }
                }
                Ok(Err(_)) | Err(_) => failed += 1,
            }
        }

        if let Err(e) = deps.store.insert_serp_results(&rows).await {
            return PhaseResult::failed(format!("failed to persist serp results: {e}"));
        }

        PhaseResult::completed(json!({ "rows": rows.len(), "failed_fetches": failed }))
    }
}

fn extract_domain(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}
