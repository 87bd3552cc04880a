//! Durable circuit-breaker and quota-counter state, and the persisted
//! configuration layer (§2's Defaults→Persisted→RequestOverride model). The
//! state machine logic itself lives in the resilience crate; this module
//! only reads and writes the rows it needs to survive a restart.

use anyhow::Result;
use chrono::NaiveDate;
use dsi_common::{CircuitBreakerState, QuotaCounter};
use serde_json::Value;

use crate::convert::circuit_state_str;
use crate::StateStore;

impl StateStore {
    pub async fn fetch_circuit_state(&self, service: &str) -> Result<Option<CircuitBreakerState>> {
        let row = sqlx::query_as::<_, CircuitBreakerState>(
            r#"SELECT service, state, consecutive_failures, last_failure_at, open_until,
                      current_cooldown_secs
               FROM circuit_breaker_state WHERE service = $1"#,
        )
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn save_circuit_state(&self, state: &CircuitBreakerState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO circuit_breaker_state
                (service, state, consecutive_failures, last_failure_at, open_until,
                 current_cooldown_secs)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (service) DO UPDATE SET
                state = EXCLUDED.state, consecutive_failures = EXCLUDED.consecutive_failures,
                last_failure_at = EXCLUDED.last_failure_at, open_until = EXCLUDED.open_until,
                current_cooldown_secs = EXCLUDED.current_cooldown_secs
            "#,
        )
        .bind(&state.service)
        .bind(circuit_state_str(state.state))
        .bind(state.consecutive_failures)
        .bind(state.last_failure_at)
        .bind(state.open_until)
        .bind(state.current_cooldown_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fetch_quota_counter(&self, service: &str, date: NaiveDate) -> Result<Option<QuotaCounter>> {
        let row = sqlx::query_as::<_, QuotaCounter>(
            "SELECT service, date, units_used, breakdown FROM quota_counters WHERE service = $1 AND date = $2",
        )
        .bind(service)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Atomically add `units` to today's counter for `service`, returning the
    /// post-increment total. The Quota Manager uses this as its single
    /// source of truth so concurrent phase workers never overshoot a cap.
    pub async fn increment_quota(&self, service: &str, date: NaiveDate, units: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO quota_counters (service, date, units_used)
            VALUES ($1, $2, $3)
            ON CONFLICT (service, date) DO UPDATE SET units_used = quota_counters.units_used + $3
            RETURNING units_used
            "#,
        )
        .bind(service)
        .bind(date)
        .bind(units)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn fetch_project_config(&self, project_id: &str) -> Result<Option<Value>> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT config FROM project_config WHERE project_id = $1")
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn save_project_config(&self, project_id: &str, config: Value) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO project_config (project_id, config) VALUES ($1, $2)
               ON CONFLICT (project_id) DO UPDATE SET config = EXCLUDED.config"#,
        )
        .bind(project_id)
        .bind(config)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
