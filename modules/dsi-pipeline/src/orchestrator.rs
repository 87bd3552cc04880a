//! DAG-driven orchestrator (§4.8): dispatches phase workers in dependency
//! waves, gates each phase on its predecessors being completed or skipped,
//! wraps every phase in its configured timeout, and applies the
//! non-critical-phase auto-skip rule on unrecoverable failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dsi_common::{PhaseName, PhaseStatusKind, PipelineConfig, PipelineRunId, PipelineStatus};
use thiserror::Error;

use crate::deps::PipelineDeps;
use crate::phases::company_enrichment_serp::CompanyEnrichmentSerpWorker;
use crate::phases::company_enrichment_youtube::CompanyEnrichmentYoutubeWorker;
use crate::phases::content_analysis::ContentAnalysisWorker;
use crate::phases::content_scraping::ContentScrapingWorker;
use crate::phases::dsi_calculation::DsiCalculationWorker;
use crate::phases::keyword_metrics::KeywordMetricsWorker;
use crate::phases::serp_collection::SerpCollectionWorker;
use crate::phases::video_enrichment::VideoEnrichmentWorker;
use crate::phases::{PhaseOutcome, PhaseWorker};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("phase {phase} failed: {message}")]
    PhaseFailed { phase: &'static str, message: String },
    #[error("run was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// At least one phase yielded on quota exhaustion; the caller (normally
    /// the watchdog) should re-invoke `drive` once the quota resets.
    Yielded,
}

pub struct Orchestrator {
    deps: Arc<PipelineDeps>,
    workers: HashMap<PhaseName, Arc<dyn PhaseWorker>>,
}

impl Orchestrator {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        let mut workers: HashMap<PhaseName, Arc<dyn PhaseWorker>> = HashMap::new();
        workers.insert(PhaseName::KeywordMetrics, Arc::new(KeywordMetricsWorker));
        workers.insert(PhaseName::SerpCollection, Arc::new(SerpCollectionWorker));
        workers.insert(PhaseName::CompanyEnrichmentSerp, Arc::new(CompanyEnrichmentSerpWorker));
        workers.insert(PhaseName::VideoEnrichment, Arc::new(VideoEnrichmentWorker));
        workers.insert(PhaseName::ContentScraping, Arc::new(ContentScrapingWorker));
        workers.insert(PhaseName::ContentAnalysis, Arc::new(ContentAnalysisWorker));
        workers.insert(PhaseName::CompanyEnrichmentYoutube, Arc::new(CompanyEnrichmentYoutubeWorker));
        workers.insert(PhaseName::DsiCalculation, Arc::new(DsiCalculationWorker));
        Self { deps, workers }
    }

    /// Restart recovery (§5): reset any phase left `running` past the grace
    /// period back to `pending` so the next `drive` call re-dispatches it.
    pub async fn recover_stale(&self, grace_minutes: i64) -> anyhow::Result<u64> {
        self.deps.store.reset_stale_running_phases(grace_minutes).await
    }

    pub async fn force_complete(&self, run_id: PipelineRunId, phase: PhaseName) -> anyhow::Result<()> {
        self.deps.store.force_complete_phase(run_id, phase).await
    }

    pub fn cancel(&self) {
        self.deps.cancelled.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    /// Drive `run_id` forward until every phase reaches a terminal status, a
    /// critical phase fails, the run is cancelled, or a phase yields on
    /// quota exhaustion.
    pub async fn drive(
        &self,
        run_id: PipelineRunId,
        config: &PipelineConfig,
    ) -> Result<RunOutcome, OrchestratorError> {
        self.deps
            .store
            .transition_run_status(run_id, Some(PipelineStatus::Pending), PipelineStatus::Running)
            .await?;

        loop {
            if self.deps.is_cancelled() {
                self.deps
                    .store
                    .transition_run_status(run_id, Some(PipelineStatus::Running), PipelineStatus::Cancelled)
                    .await?;
                return Err(OrchestratorError::Cancelled);
            }

            let phases = self.deps.store.list_phases(run_id).await?;
            let status_of: HashMap<PhaseName, PhaseStatusKind> =
                phases.iter().map(|p| (p.phase, p.status)).collect();

            if status_of.values().all(|s| is_terminal(*s)) {
                self.deps
                    .store
                    .transition_run_status(run_id, Some(PipelineStatus::Running), PipelineStatus::Completed)
                    .await?;
                return Ok(RunOutcome::Completed);
            }

            let ready: Vec<PhaseName> = PhaseName::ALL
                .into_iter()
                .filter(|p| status_of.get(p).copied() == Some(PhaseStatusKind::Pending))
                .filter(|p| {
                    p.predecessors()
                        .iter()
                        .all(|pred| status_of.get(pred).copied().is_some_and(|s| s.satisfies_dependency()))
                })
                .collect();

            if ready.is_empty() {
                // Nothing pending is runnable yet: either everything
                // remaining is still `running` (another wave in flight) or
                // genuinely blocked. Since `drive` runs waves sequentially,
                // an empty ready set here with non-terminal phases left
                // means a predecessor never reached a satisfying state.
                let stuck: Vec<&str> = status_of
                    .iter()
                    .filter(|(_, s)| !is_terminal(**s))
                    .map(|(p, _)| p.as_str())
                    .collect();
                return Err(OrchestratorError::PhaseFailed {
                    phase: "orchestrator",
                    message: format!("no runnable phase, blocked: {stuck:?}"),
                });
            }

            let mut handles = Vec::with_capacity(ready.len());
            for phase in ready {
                let deps = self.deps.clone();
                let worker = self.workers.get(&phase).expect("every phase has a worker").clone();
                let config = config.clone();
                handles.push(tokio::spawn(async move {
                    let outcome = run_one_phase(run_id, phase, &config, &deps, worker.as_ref()).await;
                    (phase, outcome)
                }));
            }

            let mut yielded = false;
            for handle in handles {
                let (phase, outcome) = handle.await.map_err(|e| OrchestratorError::PhaseFailed {
                    phase: "orchestrator",
                    message: format!("phase task panicked: {e}"),
                })?;
                match outcome {
                    Ok(PhaseOutcomeResolution::Yielded) => yielded = true,
                    Ok(_) => {}
                    Err(message) => {
                        self.deps
                            .store
                            .transition_run_status(run_id, Some(PipelineStatus::Running), PipelineStatus::Failed)
                            .await?;
                        self.deps.store.record_run_error(run_id, &message).await?;
                        return Err(OrchestratorError::PhaseFailed { phase: phase.as_str(), message });
                    }
                }
            }

            if yielded {
                return Ok(RunOutcome::Yielded);
            }
        }
    }
}

enum PhaseOutcomeResolution {
    Advanced,
    Yielded,
}

async fn run_one_phase(
    run_id: PipelineRunId,
    phase: PhaseName,
    config: &PipelineConfig,
    deps: &PipelineDeps,
    worker: &dyn PhaseWorker,
) -> Result<PhaseOutcomeResolution, String> {
    if !config.enabled_phases.is_enabled(phase) {
        deps.store
            .transition_phase(
                run_id,
                phase,
                PhaseStatusKind::Pending,
                PhaseStatusKind::Skipped,
                Some(serde_json::json!({ "reason": "disabled" })),
                None,
            )
            .await
            .map_err(|e| e.to_string())?;
        return Ok(PhaseOutcomeResolution::Advanced);
    }

    let claimed = deps
        .store
        .transition_phase(run_id, phase, PhaseStatusKind::Pending, PhaseStatusKind::Running, None, None)
        .await
        .map_err(|e| e.to_string())?;
    if !claimed {
        // Lost the race to another dispatch of the same wave; the other
        // caller owns this phase now.
        return Ok(PhaseOutcomeResolution::Advanced);
    }

    let timeout = Duration::from_secs((config.timeout_minutes.get(phase).max(1) as u64) * 60);
    let result = tokio::time::timeout(timeout, worker.run(run_id, config, deps)).await;

    let phase_result = match result {
        Ok(r) => r,
        Err(_) => crate::phases::PhaseResult::failed("phase timed out"),
    };

    match phase_result.outcome {
        PhaseOutcome::Completed | PhaseOutcome::CompletedPartial => {
            deps.store
                .transition_phase(
                    run_id,
                    phase,
                    PhaseStatusKind::Running,
                    PhaseStatusKind::Completed,
                    Some(phase_result.result),
                    None,
                )
                .await
                .map_err(|e| e.to_string())?;
            Ok(PhaseOutcomeResolution::Advanced)
        }
        PhaseOutcome::Skipped => {
            deps.store
                .transition_phase(
                    run_id,
                    phase,
                    PhaseStatusKind::Running,
                    PhaseStatusKind::Skipped,
                    Some(phase_result.result),
                    phase_result.error.as_deref(),
                )
                .await
                .map_err(|e| e.to_string())?;
            Ok(PhaseOutcomeResolution::Advanced)
        }
        PhaseOutcome::Yielded => {
            // Back to pending: the watchdog re-drives the run once quota resets.
            deps.store
                .transition_phase(
                    run_id,
                    phase,
                    PhaseStatusKind::Running,
                    PhaseStatusKind::Pending,
                    Some(phase_result.result),
                    None,
                )
                .await
                .map_err(|e| e.to_string())?;
            Ok(PhaseOutcomeResolution::Yielded)
        }
        PhaseOutcome::Failed => {
            let message = phase_result.error.unwrap_or_else(|| "unknown failure".to_string());
            if phase.is_non_critical() {
                deps.store
                    .transition_phase(
                        run_id,
                        phase,
                        PhaseStatusKind::Running,
                        PhaseStatusKind::Skipped,
                        Some(serde_json::json!({ "auto_skipped_error": message })),
                        Some(&message),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(PhaseOutcomeResolution::Advanced)
            } else {
                deps.store
                    .transition_phase(
                        run_id,
                        phase,
                        PhaseStatusKind::Running,
                        PhaseStatusKind::Failed,
                        None,
                        Some(&message),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Err(message)
            }
        }
    }
}

fn is_terminal(status: PhaseStatusKind) -> bool {
    matches!(
        status,
        PhaseStatusKind::Completed | PhaseStatusKind::Failed | PhaseStatusKind::Skipped
    )
}
