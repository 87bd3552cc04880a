//! Pipeline-run and phase-status operations (§4.1). Phase transitions use a
//! single `UPDATE ... WHERE status = $expected` so concurrent updates to the
//! same phase row are serialized by Postgres row locking rather than by an
//! application-level mutex.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use dsi_common::{PhaseName, PhaseStatus, PhaseStatusKind, PipelineMode, PipelineRunId, PipelineStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::StateStore;

#[derive(Debug, Clone)]
pub struct NewPipelineRun {
    pub project_id: String,
    pub mode: PipelineMode,
    pub config_snapshot: Value,
}

#[derive(Debug, Clone)]
pub struct PipelineRunRow {
    pub id: PipelineRunId,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: PipelineStatus,
    pub mode: PipelineMode,
    pub project_id: String,
    pub config_snapshot: Value,
    pub counters: Value,
    pub phase_results: Value,
    pub errors: Value,
}

impl StateStore {
    pub async fn create_pipeline_run(&self, new_run: NewPipelineRun) -> Result<PipelineRunRow> {
        let id = Uuid::new_v4();
        let row = sqlx::query_as::<_, PipelineRunRow>(
            r#"
            INSERT INTO pipeline_runs (id, status, mode, project_id, config_snapshot)
            VALUES ($1, 'pending', $2, $3, $4)
            RETURNING id, created_at, started_at, completed_at, status, mode, project_id,
                      config_snapshot, counters, phase_results, errors
            "#,
        )
        .bind(id)
        .bind(mode_str(new_run.mode))
        .bind(&new_run.project_id)
        .bind(&new_run.config_snapshot)
        .fetch_one(&self.pool)
        .await?;

        for phase in PhaseName::ALL {
            sqlx::query(
                r#"
                INSERT INTO phase_status (pipeline_run_id, phase, status)
                VALUES ($1, $2, 'pending')
                "#,
            )
            .bind(id)
            .bind(phase.as_str())
            .execute(&self.pool)
            .await?;
        }

        Ok(row)
    }

    pub async fn fetch_pipeline_run(&self, id: PipelineRunId) -> Result<Option<PipelineRunRow>> {
        let row = sqlx::query_as::<_, PipelineRunRow>(
            r#"
            SELECT id, created_at, started_at, completed_at, status, mode, project_id,
                   config_snapshot, counters, phase_results, errors
            FROM pipeline_runs WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_by_status(&self, status: PipelineStatus) -> Result<Vec<PipelineRunRow>> {
        let rows = sqlx::query_as::<_, PipelineRunRow>(
            r#"
            SELECT id, created_at, started_at, completed_at, status, mode, project_id,
                   config_snapshot, counters, phase_results, errors
            FROM pipeline_runs WHERE status = $1
            "#,
        )
        .bind(status_str(status))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Transition a run's status. `expected` is `None` for the initial
    /// pending→running move (no precondition needed).
    pub async fn transition_run_status(
        &self,
        id: PipelineRunId,
        expected: Option<PipelineStatus>,
        next: PipelineStatus,
    ) -> Result<bool> {
        let result = match expected {
            Some(expected) => {
                sqlx::query(
                    r#"UPDATE pipeline_runs SET status = $1,
                         started_at = CASE WHEN $1 = 'running' THEN now() ELSE started_at END,
                         completed_at = CASE WHEN $1 IN ('completed','failed','cancelled') THEN now() ELSE completed_at END
                       WHERE id = $2 AND status = $3"#,
                )
                .bind(status_str(next))
                .bind(id)
                .bind(status_str(expected))
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"UPDATE pipeline_runs SET status = $1, started_at = now() WHERE id = $2"#,
                )
                .bind(status_str(next))
                .bind(id)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_run_error(&self, id: PipelineRunId, error: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE pipeline_runs SET errors = errors || to_jsonb($1::text) WHERE id = $2"#,
        )
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn merge_counters(&self, id: PipelineRunId, counters: Value) -> Result<()> {
        sqlx::query(r#"UPDATE pipeline_runs SET counters = counters || $1 WHERE id = $2"#)
            .bind(counters)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn fetch_phase(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
    ) -> Result<Option<PhaseStatus>> {
        let row = sqlx::query_as::<_, PhaseStatus>(
            r#"
            SELECT pipeline_run_id, phase, status, started_at, completed_at, attempt_count,
                   result, last_error
            FROM phase_status WHERE pipeline_run_id = $1 AND phase = $2
            "#,
        )
        .bind(run_id)
        .bind(phase.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_phases(&self, run_id: PipelineRunId) -> Result<Vec<PhaseStatus>> {
        let rows = sqlx::query_as::<_, PhaseStatus>(
            r#"
            SELECT pipeline_run_id, phase, status, started_at, completed_at, attempt_count,
                   result, last_error
            FROM phase_status WHERE pipeline_run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Optimistic phase transition: only succeeds if the row is currently in
    /// `expected`. Callers use the boolean to decide whether they actually
    /// own the phase (§3 invariant: running on at most one run at a time is
    /// trivially true per-row, but this guards the running→completed move
    /// from racing with a timeout-triggered restart→pending move).
    pub async fn transition_phase(
        &self,
        run_id: PipelineRunId,
        phase: PhaseName,
        expected: PhaseStatusKind,
        next: PhaseStatusKind,
        result: Option<Value>,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let outcome = sqlx::query(
            r#"
            UPDATE phase_status SET
                status = $1,
                started_at = CASE WHEN $1 = 'running' THEN now() ELSE started_at END,
                completed_at = CASE WHEN $1 IN ('completed','failed','skipped') THEN now() ELSE completed_at END,
                attempt_count = CASE WHEN $1 = 'running' THEN attempt_count + 1 ELSE attempt_count END,
                result = COALESCE($2, result),
                last_error = $3
            WHERE pipeline_run_id = $4 AND phase = $5 AND status = $6
            "#,
        )
        .bind(status_kind_str(next))
        .bind(result)
        .bind(last_error)
        .bind(run_id)
        .bind(phase.as_str())
        .bind(status_kind_str(expected))
        .execute(&self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    /// Force a phase straight to `completed` regardless of its current
    /// status — the `force-complete` operational verb (§4.8).
    pub async fn force_complete_phase(&self, run_id: PipelineRunId, phase: PhaseName) -> Result<()> {
        let updated = sqlx::query(
            r#"UPDATE phase_status SET status = 'completed', completed_at = now()
               WHERE pipeline_run_id = $1 AND phase = $2"#,
        )
        .bind(run_id)
        .bind(phase.as_str())
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() != 1 {
            bail!("phase {} not found for run {}", phase.as_str(), run_id);
        }
        Ok(())
    }

    /// Restart recovery (§5): any phase still `running` older than the grace
    /// period is reverted to `pending` so the orchestrator re-dispatches it.
    pub async fn reset_stale_running_phases(&self, grace_minutes: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE phase_status SET status = 'pending'
            WHERE status = 'running' AND started_at < now() - ($1 || ' minutes')::interval
            "#,
        )
        .bind(grace_minutes.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PipelineRunRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let status: String = row.try_get("status")?;
        let mode: String = row.try_get("mode")?;
        Ok(PipelineRunRow {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            status: parse_status(&status),
            mode: parse_mode(&mode),
            project_id: row.try_get("project_id")?,
            config_snapshot: row.try_get("config_snapshot")?,
            counters: row.try_get("counters")?,
            phase_results: row.try_get("phase_results")?,
            errors: row.try_get("errors")?,
        })
    }
}

fn status_str(s: PipelineStatus) -> &'static str {
    match s {
        PipelineStatus::Pending => "pending",
        PipelineStatus::Running => "running",
        PipelineStatus::Completed => "completed",
        PipelineStatus::Failed => "failed",
        PipelineStatus::Cancelled => "cancelled",
    }
}

fn parse_status(s: &str) -> PipelineStatus {
    match s {
        "running" => PipelineStatus::Running,
        "completed" => PipelineStatus::Completed,
        "failed" => PipelineStatus::Failed,
        "cancelled" => PipelineStatus::Cancelled,
        _ => PipelineStatus::Pending,
    }
}

fn mode_str(m: PipelineMode) -> &'static str {
    match m {
        PipelineMode::Initial => "initial",
        PipelineMode::Incremental => "incremental",
    }
}

fn parse_mode(s: &str) -> PipelineMode {
    match s {
        "incremental" => PipelineMode::Incremental,
        _ => PipelineMode::Initial,
    }
}

pub(crate) fn status_kind_str(s: PhaseStatusKind) -> &'static str {
    match s {
        PhaseStatusKind::Pending => "pending",
        PhaseStatusKind::Running => "running",
        PhaseStatusKind::Completed => "completed",
        PhaseStatusKind::Failed => "failed",
        PhaseStatusKind::Skipped => "skipped",
        PhaseStatusKind::Blocked => "blocked",
    }
}

fn parse_phase_status(s: &str) -> PhaseStatusKind {
    match s {
        "running" => PhaseStatusKind::Running,
        "completed" => PhaseStatusKind::Completed,
        "failed" => PhaseStatusKind::Failed,
        "skipped" => PhaseStatusKind::Skipped,
        "blocked" => PhaseStatusKind::Blocked,
        _ => PhaseStatusKind::Pending,
    }
}

pub(crate) fn parse_phase(s: &str) -> PhaseName {
    match s {
        "serp_collection" => PhaseName::SerpCollection,
        "company_enrichment_serp" => PhaseName::CompanyEnrichmentSerp,
        "video_enrichment" => PhaseName::VideoEnrichment,
        "content_scraping" => PhaseName::ContentScraping,
        "content_analysis" => PhaseName::ContentAnalysis,
        "company_enrichment_youtube" => PhaseName::CompanyEnrichmentYoutube,
        "dsi_calculation" => PhaseName::DsiCalculation,
        _ => PhaseName::KeywordMetrics,
    }
}
