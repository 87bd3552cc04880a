//! `sqlx::FromRow` implementations for the shared row types.
//!
//! These live here (rather than alongside the queries in `dsi-store`)
//! because Rust's orphan rule forbids implementing a foreign trait
//! (`sqlx::FromRow`) for a foreign type from another crate.

use crate::convert::{
    parse_circuit_state, parse_content_type, parse_document_type, parse_label, parse_phase,
    parse_phase_status, parse_scrape_status, parse_work_item_status,
};
use crate::{
    CircuitBreakerState, CompanyProfile, ContentAnalysisRow, DsiCompanyScore, DsiPageScore,
    HistoricalKeywordMetric, PersonaAlignment, PhaseStatus, QuotaCounter, ScrapedContentRow,
    SerpBatchExpectation, SerpResultRow, WorkItem,
};

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CompanyProfile {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let technologies: serde_json::Value = row.try_get("technologies")?;
        Ok(CompanyProfile {
            root_domain: row.try_get("root_domain")?,
            company_name: row.try_get("company_name")?,
            industry: row.try_get("industry")?,
            size: row.try_get("size")?,
            technologies: serde_json::from_value::<Vec<String>>(technologies).unwrap_or_default(),
            parent_company: row.try_get("parent_company")?,
            source_type: row.try_get("source_type")?,
            profile_updated_at: row.try_get("profile_updated_at")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for HistoricalKeywordMetric {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(HistoricalKeywordMetric {
            snapshot_date: row.try_get("snapshot_date")?,
            keyword_id: row.try_get("keyword_id")?,
            country: row.try_get("country")?,
            source: row.try_get("source")?,
            avg_monthly_searches: row.try_get("avg_monthly_searches")?,
            competition_level: row.try_get("competition_level")?,
            bid_low_cents: row.try_get("bid_low_cents")?,
            bid_high_cents: row.try_get("bid_high_cents")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ScrapedContentRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let status: String = row.try_get("status")?;
        let document_type: String = row.try_get("document_type")?;
        Ok(ScrapedContentRow {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            url: row.try_get("url")?,
            status: parse_scrape_status(&status),
            final_url: row.try_get("final_url")?,
            document_type: parse_document_type(&document_type),
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            word_count: row.try_get("word_count")?,
            engine: row.try_get("engine")?,
            page_count: row.try_get("page_count")?,
            table_count: row.try_get("table_count")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ContentAnalysisRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let persona_scores: serde_json::Value = row.try_get("persona_scores")?;
        let entity_mentions: serde_json::Value = row.try_get("entity_mentions")?;
        Ok(ContentAnalysisRow {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            url: row.try_get("url")?,
            summary: row.try_get("summary")?,
            primary_persona: row.try_get("primary_persona")?,
            persona_scores: serde_json::from_value::<Vec<PersonaAlignment>>(persona_scores)
                .unwrap_or_default(),
            buyer_journey_phase: row.try_get("buyer_journey_phase")?,
            buyer_journey_score: row.try_get("buyer_journey_score")?,
            content_classification: row.try_get("content_classification")?,
            source_type: row.try_get("source_type")?,
            entity_mentions: serde_json::from_value::<Vec<String>>(entity_mentions)
                .unwrap_or_default(),
            sentiment: row.try_get("sentiment")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CircuitBreakerState {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let state: String = row.try_get("state")?;
        Ok(CircuitBreakerState {
            service: row.try_get("service")?,
            state: parse_circuit_state(&state),
            consecutive_failures: row.try_get("consecutive_failures")?,
            last_failure_at: row.try_get("last_failure_at")?,
            open_until: row.try_get("open_until")?,
            current_cooldown_secs: row.try_get("current_cooldown_secs")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for QuotaCounter {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(QuotaCounter {
            service: row.try_get("service")?,
            date: row.try_get("date")?,
            units_used: row.try_get("units_used")?,
            breakdown: row.try_get("breakdown")?,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PhaseStatus {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let phase: String = row.try_get("phase")?;
        let status: String = row.try_get("status")?;
        Ok(PhaseStatus {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            phase: parse_phase(&phase),
            status: parse_phase_status(&status),
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            attempt_count: row.try_get("attempt_count")?,
            result: row.try_get("result")?,
            last_error: row.try_get("last_error")?,
        })
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

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for WorkItem {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        let phase: String = row.try_get("phase")?;
        let status: String = row.try_get("status")?;
        Ok(WorkItem {
            pipeline_run_id: row.try_get("pipeline_run_id")?,
            phase: parse_phase(&phase),
            item_kind: row.try_get("item_kind")?,
            item_id: row.try_get("item_id")?,
            status: parse_work_item_status(&status),
            attempt_count: row.try_get("attempt_count")?,
            last_error: row.try_get("last_error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
