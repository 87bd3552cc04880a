//! SERP result rows and the batch-expectation tracking the Coordinator uses
//! to decide when a webhook-delivered batch is complete enough to proceed
//! (§4.7).

use anyhow::Result;
use chrono::NaiveDate;
use dsi_common::{ContentType, PipelineRunId, SerpBatchExpectation, SerpResultRow};
use serde_json::Value;

use crate::convert::{content_type_str, parse_content_type};
use crate::StateStore;

impl StateStore {
    pub async fn insert_serp_results(&self, rows: &[SerpResultRow]) -> Result<()> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO serp_results
                    (pipeline_run_id, keyword_id, serp_type, position, url, domain, title,
                     snippet, estimated_traffic)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (pipeline_run_id, keyword_id, serp_type, position) DO UPDATE SET
                    url = EXCLUDED.url, domain = EXCLUDED.domain, title = EXCLUDED.title,
                    snippet = EXCLUDED.snippet, estimated_traffic = EXCLUDED.estimated_traffic
                "#,
            )
            .bind(r.pipeline_run_id)
            .bind(&r.keyword_id)
            .bind(content_type_str(r.serp_type))
            .bind(r.position)
            .bind(&r.url)
            .bind(&r.domain)
            .bind(&r.title)
            .bind(&r.snippet)
            .bind(r.estimated_traffic)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn serp_results_for_run(
        &self,
        run_id: PipelineRunId,
        serp_type: ContentType,
    ) -> Result<Vec<SerpResultRow>> {
        let rows = sqlx::query_as::<_, SerpResultRow>(
            r#"
            SELECT pipeline_run_id, keyword_id, serp_type, position, url, domain, title,
                   snippet, estimated_traffic
            FROM serp_results WHERE pipeline_run_id = $1 AND serp_type = $2
            ORDER BY keyword_id, position
            "#,
        )
        .bind(run_id)
        .bind(content_type_str(serp_type))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn record_batch_expectation(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        content_type: ContentType,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO serp_batch_expectations (project_id, period_date, content_type, expected)
            VALUES ($1, $2, $3, true)
            ON CONFLICT (project_id, period_date, content_type) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(period_date)
        .bind(content_type_str(content_type))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a batch received, persisting the webhook's download links and
    /// external identifiers. Upserts so a late-arriving webhook retry is
    /// idempotent.
    pub async fn mark_batch_received(
        &self,
        project_id: &str,
        period_date: NaiveDate,
        content_type: ContentType,
        external_batch_id: &str,
        result_set_id: i64,
        download_links: Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO serp_batch_expectations
                (project_id, period_date, content_type, expected, received, received_at,
                 external_batch_id, result_set_id, download_links)
            VALUES ($1, $2, $3, true, true, now(), $4, $5, $6)
            ON CONFLICT (project_id, period_date, content_type) DO UPDATE SET
                received = true, received_at = now(), external_batch_id = EXCLUDED.external_batch_id,
                result_set_id = EXCLUDED.result_set_id, download_links = EXCLUDED.download_links
            "#,
        )
        .bind(project_id)
        .bind(period_date)
        .bind(content_type_str(content_type))
        .bind(external_batch_id)
        .bind(result_set_id)
        .bind(download_links)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn batch_expectations(
        &self,
        project_id: &str,
        period_date: NaiveDate,
    ) -> Result<Vec<SerpBatchExpectation>> {
        let rows = sqlx::query_as::<_, SerpBatchExpectation>(
            r#"
            SELECT project_id, period_date, content_type, expected, received, received_at,
                   external_batch_id, result_set_id, download_links
            FROM serp_batch_expectations WHERE project_id = $1 AND period_date = $2
            "#,
        )
        .bind(project_id)
        .bind(period_date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SerpResultRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let serp_type: String = row.try_get("serp_type")?;
        Ok(SerpResultRow {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            keyword_id: row.try_get("keyword_id")?,
            serp_type: parse_content_type(&serp_type),
            position: row.try_get("position")?,
            url: row.try_get("url")?,
            domain: row.try_get("domain")?,
            title: row.try_get("title")?,
            snippet: row.try_get("snippet")?,
            estimated_traffic: row.try_get("estimated_traffic")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SerpBatchExpectation {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let content_type: String = row.try_get("content_type")?;
        Ok(SerpBatchExpectation {
            project_id: row.try_get("project_id")?,
            period_date: row.try_get("period_date")?,
            content_type: parse_content_type(&content_type),
            expected: row.try_get("expected")?,
            received: row.try_get("received")?,
            received_at: row.try_get("received_at")?,
            external_batch_id: row.try_get("external_batch_id")?,
            result_set_id: row.try_get("result_set_id")?,
            download_links: row.try_get("download_links")?,
        })
    }
}
