//! Append-only fact store backed by Postgres. Gap-free reads are guaranteed
//! internally — consumers never see BIGSERIAL gaps left by rolled-back or
//! still-in-flight transactions. Used to reconstruct pipeline-run timelines
//! (§4.1) and as the persistence layer the dispatch engine chains events
//! through.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub seq: i64,
    pub ts: DateTime<Utc>,
    pub event_type: String,
    pub parent_seq: Option<i64>,
    pub caused_by_seq: Option<i64>,
    pub run_id: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct AppendEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub run_id: Option<String>,
}

impl AppendEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn append_and_read(&self, event: AppendEvent) -> Result<StoredEvent> {
        let stored = sqlx::query_as::<_, StoredEvent>(
            r#"
            INSERT INTO pipeline_events (event_type, parent_seq, caused_by_seq, run_id, payload)
            VALUES ($1, NULL, NULL, $2, $3)
            RETURNING seq, ts, event_type, parent_seq, caused_by_seq, run_id, payload
            "#,
        )
        .bind(&event.event_type)
        .bind(&event.run_id)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;

        notify_new_event(&self.pool, stored.seq).await;
        Ok(stored)
    }

    pub async fn append_child_and_read(
        &self,
        parent_seq: i64,
        event: AppendEvent,
    ) -> Result<StoredEvent> {
        let stored = sqlx::query_as::<_, StoredEvent>(
            r#"
            INSERT INTO pipeline_events (event_type, parent_seq, caused_by_seq, run_id, payload)
            VALUES ($1, $2, $2, $3, $4)
            RETURNING seq, ts, event_type, parent_seq, caused_by_seq, run_id, payload
            "#,
        )
        .bind(&event.event_type)
        .bind(parent_seq)
        .bind(&event.run_id)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;

        notify_new_event(&self.pool, stored.seq).await;
        Ok(stored)
    }

    /// Read facts in flat sequence order starting from `seq_start` (inclusive).
    /// Gap-free: stops at the first gap so an in-flight transaction never
    /// produces a torn read.
    pub async fn read_from(&self, seq_start: i64, limit: i64) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT seq, ts, event_type, parent_seq, caused_by_seq, run_id, payload
            FROM pipeline_events
            WHERE seq >= $1
            ORDER BY seq ASC
            LIMIT $2
            "#,
        )
        .bind(seq_start)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        let mut expected = seq_start;
        for row in rows {
            if row.seq != expected {
                break;
            }
            expected = row.seq + 1;
            result.push(row);
        }
        Ok(result)
    }

    /// Read every event for a given pipeline-run, in sequence order — the
    /// timeline reconstruction the state store's append-only log exists for.
    pub async fn read_by_run(&self, run_id: &str) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<_, StoredEvent>(
            r#"
            SELECT seq, ts, event_type, parent_seq, caused_by_seq, run_id, payload
            FROM pipeline_events
            WHERE run_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn latest_seq(&self) -> Result<i64> {
        let row = sqlx::query_as::<_, (Option<i64>,)>("SELECT MAX(seq) FROM pipeline_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0.unwrap_or(0))
    }
}

async fn notify_new_event(pool: &PgPool, seq: i64) {
    let result = sqlx::query("SELECT pg_notify('pipeline_events', $1::text)")
        .bind(seq)
        .execute(pool)
        .await;
    if let Err(e) = result {
        warn!(error = %e, seq, "PG NOTIFY failed (non-fatal)");
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEvent {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(StoredEvent {
            seq: row.try_get("seq")?,
            ts: row.try_get("ts")?,
            event_type: row.try_get("event_type")?,
            parent_seq: row.try_get("parent_seq")?,
            caused_by_seq: row.try_get("caused_by_seq")?,
            run_id: row.try_get("run_id")?,
            payload: row.try_get("payload")?,
        })
    }
}
