//! One module per phase kind (§4.6). Each worker takes the run id, the
//! merged pipeline configuration, and the shared collaborators, and returns
//! a `PhaseOutcome` the orchestrator uses to decide the next phase-status
//! transition.

pub mod company_enrichment_serp;
pub mod company_enrichment_youtube;
pub mod content_analysis;
pub mod content_scraping;
pub mod dsi_calculation;
pub mod keyword_metrics;
pub mod serp_collection;
pub mod video_enrichment;

use async_trait::async_trait;
use dsi_common::{PipelineConfig, PipelineRunId};
use serde_json::Value;

use crate::deps::PipelineDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// All work finished; `result` carries the typed summary.
    Completed,
    /// A non-critical phase could not complete and is being auto-skipped.
    Skipped,
    /// Flexible-completion thresholds met at <100% progress (§4.6.4/.5/.6).
    CompletedPartial,
    /// Quota exhausted; phase should be resumed by the watchdog after reset.
    Yielded,
    /// Unrecoverable failure; fails the pipeline unless the phase is
    /// non-critical.
    Failed,
}

pub struct PhaseResult {
    pub outcome: PhaseOutcome,
    pub result: Value,
    pub error: Option<String>,
}

impl PhaseResult {
    pub fn completed(result: Value) -> Self {
        Self {
            outcome: PhaseOutcome::Completed,
            result,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            outcome: PhaseOutcome::Failed,
            result: Value::Null,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait PhaseWorker: Send + Sync {
    async fn run(&self, run_id: PipelineRunId, config: &PipelineConfig, deps: &PipelineDeps) -> PhaseResult;
}
