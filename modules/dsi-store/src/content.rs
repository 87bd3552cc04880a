//! Scraped-document bodies and the structured analysis extracted from them
//! (§4.6.4, §4.6.5).

use anyhow::Result;
use dsi_common::{ContentAnalysisRow, PipelineRunId, ScrapeStatus, ScrapedContentRow};

use crate::convert::{document_type_str, scrape_status_str};
use crate::StateStore;

impl StateStore {
    pub async fn upsert_scraped_content(&self, row: &ScrapedContentRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraped_content
                (pipeline_run_id, url, status, final_url, document_type, title, body,
                 word_count, engine, page_count, table_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (pipeline_run_id, url) DO UPDATE SET
                status = EXCLUDED.status, final_url = EXCLUDED.final_url,
                document_type = EXCLUDED.document_type, title = EXCLUDED.title,
                body = EXCLUDED.body, word_count = EXCLUDED.word_count, engine = EXCLUDED.engine,
                page_count = EXCLUDED.page_count, table_count = EXCLUDED.table_count
            "#,
        )
        .bind(row.pipeline_run_id)
        .bind(&row.url)
        .bind(scrape_status_str(row.status))
        .bind(&row.final_url)
        .bind(document_type_str(row.document_type))
        .bind(&row.title)
        .bind(&row.body)
        .bind(row.word_count)
        .bind(&row.engine)
        .bind(row.page_count)
        .bind(row.table_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn scraped_content_for_run(
        &self,
        run_id: PipelineRunId,
        status: Option<ScrapeStatus>,
    ) -> Result<Vec<ScrapedContentRow>> {
        let rows = match status {
            Some(s) => {
                sqlx::query_as::<_, ScrapedContentRow>(
                    r#"SELECT pipeline_run_id, url, status, final_url, document_type, title,
                              body, word_count, engine, page_count, table_count
                       FROM scraped_content WHERE pipeline_run_id = $1 AND status = $2"#,
                )
                .bind(run_id)
                .bind(scrape_status_str(s))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ScrapedContentRow>(
                    r#"SELECT pipeline_run_id, url, status, final_url, document_type, title,
                              body, word_count, engine, page_count, table_count
                       FROM scraped_content WHERE pipeline_run_id = $1"#,
                )
                .bind(run_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn upsert_content_analysis(&self, row: &ContentAnalysisRow) -> Result<()> {
        let persona_scores = serde_json::to_value(&row.persona_scores)?;
        let entity_mentions = serde_json::to_value(&row.entity_mentions)?;
        sqlx::query(
            r#"
            INSERT INTO content_analysis
                (pipeline_run_id, url, summary, primary_persona, persona_scores,
                 buyer_journey_phase, buyer_journey_score, content_classification, source_type,
                 entity_mentions, sentiment)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (pipeline_run_id, url) DO UPDATE SET
                summary = EXCLUDED.summary, primary_persona = EXCLUDED.primary_persona,
                persona_scores = EXCLUDED.persona_scores,
                buyer_journey_phase = EXCLUDED.buyer_journey_phase,
                buyer_journey_score = EXCLUDED.buyer_journey_score,
                content_classification = EXCLUDED.content_classification,
                source_type = EXCLUDED.source_type, entity_mentions = EXCLUDED.entity_mentions,
                sentiment = EXCLUDED.sentiment
            "#,
        )
        .bind(row.pipeline_run_id)
        .bind(&row.url)
        .bind(&row.summary)
        .bind(&row.primary_persona)
        .bind(persona_scores)
        .bind(&row.buyer_journey_phase)
        .bind(row.buyer_journey_score)
        .bind(&row.content_classification)
        .bind(&row.source_type)
        .bind(entity_mentions)
        .bind(&row.sentiment)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn content_analysis_for_run(&self, run_id: PipelineRunId) -> Result<Vec<ContentAnalysisRow>> {
        let rows = sqlx::query_as::<_, ContentAnalysisRow>(
            r#"SELECT pipeline_run_id, url, summary, primary_persona, persona_scores,
                      buyer_journey_phase, buyer_journey_score, content_classification,
                      source_type, entity_mentions, sentiment
               FROM content_analysis WHERE pipeline_run_id = $1"#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
