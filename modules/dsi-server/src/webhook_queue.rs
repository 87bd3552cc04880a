//! Background consumer for SERP batch webhooks (§6): the HTTP handler must
//! answer within 5 seconds regardless of how long batch-completeness
//! checking and run creation take, so it only validates the payload shape
//! and hands the rest to this queue.

use std::sync::Arc;

use chrono::NaiveDate;
use dsi_common::config::PipelineConfig;
use dsi_common::PipelineMode;
use dsi_coordinator::{IntakeOutcome, SerpBatchCoordinator, WebhookPayload};
use dsi_pipeline::Orchestrator;
use tokio::sync::mpsc;

pub struct WebhookJob {
    pub project_id: String,
    pub period_date: NaiveDate,
    pub payload: WebhookPayload,
}

pub fn spawn_consumer(
    coordinator: Arc<SerpBatchCoordinator>,
    orchestrator: Arc<Orchestrator>,
    config: PipelineConfig,
    buffer: usize,
) -> mpsc::Sender<WebhookJob> {
    let (tx, mut rx) = mpsc::channel::<WebhookJob>(buffer);
    let config_snapshot = serde_json::to_value(&config).unwrap_or(serde_json::Value::Null);

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let outcome = coordinator
                .handle_webhook(
                    &job.project_id,
                    job.period_date,
                    &job.payload,
                    PipelineMode::Initial,
                    config_snapshot.clone(),
                )
                .await;

            match outcome {
                Ok(IntakeOutcome::Started { run, missing }) => {
                    tracing::info!(
                        run_id = %run.id,
                        project_id = job.project_id,
                        ?missing,
                        "coordinator started a run from webhook intake"
                    );
                    let orchestrator = orchestrator.clone();
                    let project_id = job.project_id.clone();
                    let period_date = job.period_date;
                    let run_id = run.id;
                    let coordinator = coordinator.clone();
                    let config = config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = orchestrator.drive(run_id, &config).await {
                            tracing::error!(error = %e, run_id = %run_id, "driven run ended in error");
                        }
                        if let Err(e) = coordinator.release(&project_id, period_date).await {
                            tracing::warn!(error = %e, project_id, %period_date, "failed to release coordinator lock");
                        }
                    });
                }
                Ok(IntakeOutcome::Waiting { received, expected }) => {
                    tracing::debug!(received, expected, project_id = job.project_id, "waiting on more SERP batches");
                }
                Ok(IntakeOutcome::AlreadyRunning) => {
                    tracing::debug!(project_id = job.project_id, "webhook observed a run already in flight");
                }
                Err(e) => {
                    tracing::warn!(error = %e, project_id = job.project_id, "webhook intake failed");
                }
            }
        }
    });

    tx
}
