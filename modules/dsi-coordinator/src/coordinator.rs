//! SERP Batch Coordinator (§4.7): turns a stream of per-content-type webhook
//! deliveries into exactly one pipeline start per (project, period), either
//! once every expected batch has arrived or once a cutoff grace window has
//! elapsed since the first one did.

use chrono::{NaiveDate, Utc};
use dsi_common::{ContentType, PipelineMode};
use dsi_store::{NewPipelineRun, PipelineRunRow, StateStore};
use serde_json::Value;
use thiserror::Error;

use crate::webhook::WebhookPayload;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unrecognized webhook type: {0}")]
    UnrecognizedType(String),
    #[error("batch name does not map to a known content type: {0}")]
    UnknownBatchName(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug)]
pub enum IntakeOutcome {
    /// Recorded, but not every expected batch has arrived and the cutoff
    /// hasn't elapsed yet.
    Waiting { received: usize, expected: usize },
    /// Every expected batch arrived, or the cutoff passed: a run was
    /// started.
    Started { run: Box<PipelineRunRow>, missing: Vec<ContentType> },
    /// A run for this (project, period) is already in flight; the webhook
    /// still updated its batch's download links but did not trigger a
    /// second start.
    AlreadyRunning,
}

pub struct SerpBatchCoordinator {
    store: StateStore,
    cutoff_minutes: i64,
}

impl SerpBatchCoordinator {
    pub fn new(store: StateStore, cutoff_minutes: i64) -> Self {
        Self { store, cutoff_minutes }
    }

    /// Registers which content types a period expects batches for, before
    /// any webhook for it has arrived. Idempotent.
    pub async fn expect_batches(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        content_types: &[ContentType],
    ) -> Result<(), CoordinatorError> {
        for content_type in content_types {
            self.store.record_batch_expectation(project_id, period_date, *content_type).await?;
        }
        Ok(())
    }

    /// Records a webhook delivery and, if the batch set for this period is
    /// now complete (or its cutoff has passed), acquires the start lock and
    /// creates the pipeline run. At most one caller across any number of
    /// concurrent webhook deliveries ever observes `Started`.
    pub async fn handle_webhook(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        payload: &WebhookPayload,
        mode: PipelineMode,
        config_snapshot: Value,
    ) -> Result<IntakeOutcome, CoordinatorError> {
        if !payload.is_recognized_type() {
            return Err(CoordinatorError::UnrecognizedType(payload.request_info.kind.clone()));
        }
        let content_type = ContentType::from_batch_name(&payload.batch.name)
            .ok_or_else(|| CoordinatorError::UnknownBatchName(payload.batch.name.clone()))?;

        let download_links = serde_json::json!({
            "json": payload.result_set.download_links.json,
            "csv": payload.result_set.download_links.csv,
        });
        self.store
            .mark_batch_received(
                project_id,
                period_date,
                content_type,
                &payload.batch.id,
                payload.result_set.id,
                download_links,
            )
            .await?;

        self.try_start(project_id, period_date, mode, config_snapshot).await
    }

    /// Re-evaluates completeness/cutoff for a period without a fresh webhook
    /// delivery — the watchdog's periodic sweep calls this so a period whose
    /// last expected batch never arrives still starts once its cutoff
    /// elapses.
    pub async fn try_start(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        mode: PipelineMode,
        config_snapshot: Value,
    ) -> Result<IntakeOutcome, CoordinatorError> {
        let expectations = self.store.batch_expectations(project_id, period_date).await?;
        let expected: Vec<_> = expectations.iter().filter(|e| e.expected).collect();
        let received_count = expected.iter().filter(|e| e.received).count();
        let all_received = !expected.is_empty() && received_count == expected.len();

        let cutoff_elapsed = expected
            .iter()
            .filter_map(|e| e.received_at)
            .min()
            .map(|first_received| {
                Utc::now().signed_duration_since(first_received).num_minutes() >= self.cutoff_minutes
            })
            .unwrap_or(false);

        if !all_received && !cutoff_elapsed {
            return Ok(IntakeOutcome::Waiting { received: received_count, expected: expected.len() });
        }

        let missing: Vec<ContentType> =
            expected.iter().filter(|e| !e.received).map(|e| e.content_type).collect();
        if !missing.is_empty() {
            tracing::warn!(project_id, %period_date, ?missing, "starting run with missing SERP batches after cutoff");
        }

        let reservation = uuid::Uuid::new_v4();
        let acquired = self.store.try_acquire_coordinator_lock(project_id, period_date, reservation).await?;
        if !acquired {
            return Ok(IntakeOutcome::AlreadyRunning);
        }

        let run = self
            .store
            .create_pipeline_run(NewPipelineRun {
                project_id: project_id.to_string(),
                mode,
                config_snapshot,
            })
            .await?;
        self.store.attach_coordinator_lock_run(project_id, period_date, run.id).await?;

        Ok(IntakeOutcome::Started { run: Box::new(run), missing })
    }

    /// Releases the start lock so a future period can start again. Callers
    /// invoke this once the run the lock is tied to reaches a terminal
    /// status.
    pub async fn release(&self, project_id: &str, period_date: NaiveDate) -> Result<(), CoordinatorError> {
        self.store.release_coordinator_lock(project_id, period_date).await?;
        Ok(())
    }
}
