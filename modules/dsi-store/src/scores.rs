//! Final DSI ranking rows (§4.6.7) and the raw video engagement snapshots
//! video enrichment persists.

use anyhow::Result;
use dsi_common::{ContentType, DsiCompanyScore, DsiPageScore, PipelineRunId};

use crate::convert::{content_type_str, label_str, parse_content_type, parse_label};
use crate::StateStore;

#[derive(Debug, Clone)]
pub struct VideoSnapshot {
    pub pipeline_run_id: PipelineRunId,
    pub video_id: String,
    pub channel_id: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub duration_secs: i32,
}

impl StateStore {
    /// Replace the full score table for a (run, content_type) pair — DSI
    /// calculation is a pure recompute over that run's collected data, not
    /// an incremental update.
    pub async fn replace_dsi_scores(
        &self,
        run_id: PipelineRunId,
        content_type: ContentType,
        scores: &[DsiCompanyScore],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM dsi_company_scores WHERE pipeline_run_id = $1 AND content_type = $2")
            .bind(run_id)
            .bind(content_type_str(content_type))
            .execute(&mut *tx)
            .await?;

        for s in scores {
            sqlx::query(
                r#"
                INSERT INTO dsi_company_scores
                    (pipeline_run_id, content_type, root_domain, keyword_coverage, traffic_share,
                     content_relevance, market_presence, position_score, dsi, rank, label)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(s.pipeline_run_id)
            .bind(content_type_str(s.content_type))
            .bind(&s.root_domain)
            .bind(s.keyword_coverage)
            .bind(s.traffic_share)
            .bind(s.content_relevance)
            .bind(s.market_presence)
            .bind(s.position_score)
            .bind(s.dsi)
            .bind(s.rank)
            .bind(label_str(s.label))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn dsi_scores_for_run(
        &self,
        run_id: PipelineRunId,
        content_type: ContentType,
    ) -> Result<Vec<DsiCompanyScore>> {
        let rows = sqlx::query_as::<_, DsiCompanyScore>(
            r#"SELECT pipeline_run_id, content_type, root_domain, keyword_coverage, traffic_share,
                      content_relevance, market_presence, position_score, dsi, rank, label
               FROM dsi_company_scores WHERE pipeline_run_id = $1 AND content_type = $2
               ORDER BY rank ASC"#,
        )
        .bind(run_id)
        .bind(content_type_str(content_type))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Companion to `replace_dsi_scores` — same recompute-not-update contract,
    /// scoped to individual pages rather than domains (§4.6.7).
    pub async fn replace_page_scores(
        &self,
        run_id: PipelineRunId,
        content_type: ContentType,
        scores: &[DsiPageScore],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM dsi_page_scores WHERE pipeline_run_id = $1 AND content_type = $2")
            .bind(run_id)
            .bind(content_type_str(content_type))
            .execute(&mut *tx)
            .await?;

        for s in scores {
            sqlx::query(
                r#"
                INSERT INTO dsi_page_scores
                    (pipeline_run_id, content_type, url, root_domain, content_relevance,
                     position_score, contribution)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(s.pipeline_run_id)
            .bind(content_type_str(s.content_type))
            .bind(&s.url)
            .bind(&s.root_domain)
            .bind(s.content_relevance)
            .bind(s.position_score)
            .bind(s.contribution)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn page_scores_for_run(
        &self,
        run_id: PipelineRunId,
        content_type: ContentType,
    ) -> Result<Vec<DsiPageScore>> {
        let rows = sqlx::query_as::<_, DsiPageScore>(
            r#"SELECT pipeline_run_id, content_type, url, root_domain, content_relevance,
                      position_score, contribution
               FROM dsi_page_scores WHERE pipeline_run_id = $1 AND content_type = $2"#,
        )
        .bind(run_id)
        .bind(content_type_str(content_type))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn upsert_video_snapshot(&self, v: &VideoSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO video_snapshots
                (pipeline_run_id, video_id, channel_id, view_count, like_count, comment_count,
                 duration_secs)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (pipeline_run_id, video_id) DO UPDATE SET
                channel_id = EXCLUDED.channel_id, view_count = EXCLUDED.view_count,
                like_count = EXCLUDED.like_count, comment_count = EXCLUDED.comment_count,
                duration_secs = EXCLUDED.duration_secs
            "#,
        )
        .bind(v.pipeline_run_id)
        .bind(&v.video_id)
        .bind(&v.channel_id)
        .bind(v.view_count)
        .bind(v.like_count)
        .bind(v.comment_count)
        .bind(v.duration_secs)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn video_snapshots_for_run(&self, run_id: PipelineRunId) -> Result<Vec<VideoSnapshot>> {
        let rows = sqlx::query_as::<_, VideoSnapshot>(
            r#"SELECT pipeline_run_id, video_id, channel_id, view_count, like_count,
                      comment_count, duration_secs
               FROM video_snapshots WHERE pipeline_run_id = $1"#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for DsiCompanyScore {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let content_type: String = row.try_get("content_type")?;
        let label: String = row.try_get("label")?;
        Ok(DsiCompanyScore {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            content_type: parse_content_type(&content_type),
            root_domain: row.try_get("root_domain")?,
            keyword_coverage: row.try_get("keyword_coverage")?,
            traffic_share: row.try_get("traffic_share")?,
            content_relevance: row.try_get("content_relevance")?,
            market_presence: row.try_get("market_presence")?,
            position_score: row.try_get("position_score")?,
            dsi: row.try_get("dsi")?,
            rank: row.try_get("rank")?,
            label: parse_label(&label),
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for DsiPageScore {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let content_type: String = row.try_get("content_type")?;
        Ok(DsiPageScore {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            content_type: parse_content_type(&content_type),
            url: row.try_get("url")?,
            root_domain: row.try_get("root_domain")?,
            content_relevance: row.try_get("content_relevance")?,
            position_score: row.try_get("position_score")?,
            contribution: row.try_get("contribution")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for VideoSnapshot {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(VideoSnapshot {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            video_id: row.try_get("video_id")?,
            channel_id: row.try_get("channel_id")?,
            view_count: row.try_get("view_count")?,
            like_count: row.try_get("like_count")?,
            comment_count: row.try_get("comment_count")?,
            duration_secs: row.try_get("duration_secs")?,
        })
    }
}
