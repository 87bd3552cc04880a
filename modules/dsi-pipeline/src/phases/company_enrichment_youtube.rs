//! Synthetic secondary step (§3): resolves each enriched video's channel to
//! a root domain, using the channel→company map the Background Channel
//! Resolver maintains out of band. This worker never calls an external
//! collaborator itself — it only consumes mappings the resolver already
//! produced, bumping the attempt counter for channels still unresolved so
//! the resolver can prioritize them on its next sweep.

use async_trait::async_trait;
use dsi_common::{PipelineConfig, PipelineRunId};
use serde_json::json;

use super::{PhaseOutcome, PhaseResult, PhaseWorker};
use crate::deps::PipelineDeps;

pub struct CompanyEnrichmentYoutubeWorker;

#[async_trait]
impl PhaseWorker for CompanyEnrichmentYoutubeWorker {
    async fn run(&self, run_id: PipelineRunId, _config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult {
        let snapshots = match deps.store.video_snapshots_for_run(run_id).await {
            Ok(rows) => rows,
            Err(e) => return PhaseResult::failed(format!("failed to read video snapshots: {e}")),
        };

        if snapshots.is_empty() {
            // No video results this run: nothing to resolve, and the phase
            // is satisfied trivially (video enrichment itself may have been
            // skipped or yielded zero rows).
            return PhaseResult::completed(json!({ "channels": 0, "resolved": 0 }));
        }

        let mut channels: std::collections::HashSet<String> =
            snapshots.into_iter().map(|v| v.channel_id).filter(|c| !c.is_empty()).collect();
        let total = channels.len();
        let mut resolved = 0usize;

        for channel_id in channels.drain() {
            if deps.is_cancelled() {
                return PhaseResult::failed("cancelled");
            }
            match deps.store.fetch_channel_mapping(&channel_id).await {
                Ok(Some(mapping)) if !mapping.root_domain.is_empty() => {
                    resolved += 1;
                }
                Ok(_) => {
                    let _ = deps.store.bump_channel_resolution_attempt(&channel_id).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, channel_id, "channel mapping lookup failed");
                }
            }
        }

        // Non-critical by nature of depending on a non-critical predecessor
        // (video_enrichment): an incomplete resolution set still lets
        // DSI calculation proceed using whatever domains did resolve.
        let ratio = if total == 0 { 1.0 } else { resolved as f64 / total as f64 };
        let outcome = if ratio >= 1.0 {
            PhaseOutcome::Completed
        } else if ratio > 0.0 {
            PhaseOutcome::CompletedPartial
        } else {
            PhaseOutcome::Skipped
        };

        PhaseResult {
            outcome,
            result: json!({ "channels": total, "resolved": resolved }),
            error: None,
        }
    }
}
