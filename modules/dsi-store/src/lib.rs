//! Durable state store for pipeline runs, phase status, work items, and the
//! append-only event log (§4.1). Every other crate that touches Postgres
//! goes through `StateStore` or `event_log::EventStore`.

mod companies;
mod content;
mod convert;
pub mod event_log;
mod resilience_store;
mod runs;
mod scores;
mod serp;
mod work_items;

pub use companies::ChannelCompanyMapping;
pub use event_log::{AppendEvent, EventStore, StoredEvent};
pub use runs::{NewPipelineRun, PipelineRunRow};
pub use scores::VideoSnapshot;

use anyhow::Result;
use sqlx::PgPool;

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Clone)]
pub struct StateStore {
    pool: PgPool,
}

impl StateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn events(&self) -> EventStore {
        EventStore::new(self.pool.clone())
    }
}

/// Apply the embedded schema. Idempotent (`CREATE TABLE IF NOT EXISTS`), so
/// every process can call this on boot without a separate migration step.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA_SQL.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_common::{PhaseName, PhaseStatusKind, PipelineMode, PipelineStatus};
    use serde_json::json;

    // These exercise the query construction paths against a real Postgres
    // instance; they are `#[ignore]`d by default since this crate has no
    // embedded database for unit tests to run against.

    async fn pool() -> PgPool {
        PgPool::connect(&std::env::var("DATABASE_URL").unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore]
    async fn create_run_seeds_all_eight_phases_pending() {
        let pool = pool().await;
        migrate(&pool).await.unwrap();
        let store = StateStore::new(pool);
        let run = store
            .create_pipeline_run(NewPipelineRun {
                project_id: "acme".into(),
                mode: PipelineMode::Initial,
                config_snapshot: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(run.status, PipelineStatus::Pending);
        let phases = store.list_phases(run.id).await.unwrap();
        assert_eq!(phases.len(), 8);
        assert!(phases.iter().all(|p| p.status == PhaseStatusKind::Pending));
    }

    #[tokio::test]
    #[ignore]
    async fn phase_transition_rejects_stale_expected_status() {
        let pool = pool().await;
        migrate(&pool).await.unwrap();
        let store = StateStore::new(pool);
        let run = store
            .create_pipeline_run(NewPipelineRun {
                project_id: "acme".into(),
                mode: PipelineMode::Initial,
                config_snapshot: json!({}),
            })
            .await
            .unwrap();

        let ok = store
            .transition_phase(
                run.id,
                PhaseName::KeywordMetrics,
                PhaseStatusKind::Pending,
                PhaseStatusKind::Running,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(ok);

        // Racing transition expecting the old status must fail.
        let raced = store
            .transition_phase(
                run.id,
                PhaseName::KeywordMetrics,
                PhaseStatusKind::Pending,
                PhaseStatusKind::Running,
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!raced);
    }

    #[tokio::test]
    #[ignore]
    async fn coordinator_lock_is_exclusive() {
        let pool = pool().await;
        migrate(&pool).await.unwrap();
        let store = StateStore::new(pool);
        let run_a = uuid::Uuid::new_v4();
        let run_b = uuid::Uuid::new_v4();
        let date = chrono::Utc::now().date_naive();

        assert!(store
            .try_acquire_coordinator_lock("acme", date, run_a)
            .await
            .unwrap());
        assert!(!store
            .try_acquire_coordinator_lock("acme", date, run_b)
            .await
            .unwrap());
    }
}
