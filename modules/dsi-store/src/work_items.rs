//! Bulk work-item queue used by phase workers to track per-item progress
//! within a phase (one row per keyword, URL, or channel being processed) and
//! the per-project-per-period coordinator lock (§4.7).

use anyhow::Result;
use chrono::NaiveDate;
use dsi_common::{PhaseName, PipelineRunId, WorkItem, WorkItemStatus};

use crate::convert::work_item_status_str;
use crate::StateStore;

impl StateStore {
    /// Insert a batch of queued work items for a phase. Idempotent: an item
    /// already present keeps its existing status.
    pub async fn enqueue_work_items(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        item_kind: &str,
        item_ids: &[String],
    ) -> Result<()> {
        for item_id in item_ids {
            sqlx::query(
                r#"
                INSERT INTO work_items (pipeline_run_id, phase, item_kind, item_id, status)
                VALUES ($1, $2, $3, $4, 'queued')
                ON CONFLICT (pipeline_run_id, phase, item_kind, item_id) DO NOTHING
                "#,
            )
            .bind(run_id)
            .bind(phase.as_str())
            .bind(item_kind)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn dequeue_work_items(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        item_kind: &str,
        limit: i64,
    ) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query_as::<_, WorkItem>(
            r#"
            UPDATE work_items SET status = 'processing', updated_at = now()
            WHERE (pipeline_run_id, phase, item_kind, item_id) IN (
                SELECT pipeline_run_id, phase, item_kind, item_id FROM work_items
                WHERE pipeline_run_id = $1 AND phase = $2 AND item_kind = $3 AND status = 'queued'
                ORDER BY item_id
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING pipeline_run_id, phase, item_kind, item_id, status, attempt_count,
                      last_error, updated_at
            "#,
        )
        .bind(run_id)
        .bind(phase.as_str())
        .bind(item_kind)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn complete_work_item(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        item_kind: &str,
        item_id: &str,
        outcome: WorkItemStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE work_items SET status = $1, updated_at = now(), last_error = $2,
                   attempt_count = attempt_count + CASE WHEN $1 = 'failed' THEN 1 ELSE 0 END
            WHERE pipeline_run_id = $3 AND phase = $4 AND item_kind = $5 AND item_id = $6
            "#,
        )
        .bind(work_item_status_str(outcome))
        .bind(last_error)
        .bind(run_id)
        .bind(phase.as_str())
        .bind(item_kind)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True once every queued/processing item for the phase has reached a
    /// terminal status — the completion predicate phase workers poll on.
    pub async fn work_items_all_terminal(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        item_kind: &str,
    ) -> Result<bool> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT count(*) FROM work_items
            WHERE pipeline_run_id = $1 AND phase = $2 AND item_kind = $3
              AND status IN ('queued','processing')
            "#,
        )
        .bind(run_id)
        .bind(phase.as_str())
        .bind(item_kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 == 0)
    }

    pub async fn count_failed_work_items(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        item_kind: &str,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"SELECT count(*) FROM work_items
               WHERE pipeline_run_id = $1 AND phase = $2 AND item_kind = $3 AND status = 'failed'"#,
        )
        .bind(run_id)
        .bind(phase.as_str())
        .bind(item_kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// Atomic acquire: the insert only succeeds if no lock row exists yet
    /// for this (project, period) pair, so two concurrent triggers (webhook
    /// and scheduler) can never both start a run for the same period.
    pub async fn try_acquire_coordinator_lock(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        run_id: PipelineRunId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO coordinator_locks (project_id, period_date, pipeline_run_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, period_date) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(period_date)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Backfill the lock row with the real run id once the pipeline run has
    /// actually been created. The lock is acquired with a provisional id
    /// first so the insert itself is the atomic decision point; this just
    /// makes the row traceable to the run it ended up starting.
    pub async fn attach_coordinator_lock_run(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        run_id: PipelineRunId,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE coordinator_locks SET pipeline_run_id = $1 WHERE project_id = $2 AND period_date = $3",
        )
        .bind(run_id)
        .bind(project_id)
        .bind(period_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn release_coordinator_lock(
        &self,
        project_id: &str,
        period_date: NaiveDate,
    ) -> Result<()> {
        sqlx::query("DELETE FROM coordinator_locks WHERE project_id = $1 AND period_date = $2")
            .bind(project_id)
            .bind(period_date)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
