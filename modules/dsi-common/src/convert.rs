//! String<->enum conversions shared by the per-table modules. Kept in one
//! place so the Postgres text representation of each enum has a single
//! source of truth.

use crate::{
    CircuitState, ContentType, MarketPositionLabel, PhaseName, PhaseStatusKind, ScrapeStatus,
    ScrapedDocumentType, WorkItemStatus,
};

pub fn content_type_str(c: ContentType) -> &'static str {
    c.as_str()
}

pub fn parse_content_type(s: &str) -> ContentType {
    match s {
        "news" => ContentType::News,
        "video" => ContentType::Video,
        _ => ContentType::Organic,
    }
}

pub fn scrape_status_str(s: ScrapeStatus) -> &'static str {
    match s {
        ScrapeStatus::Completed => "completed",
        ScrapeStatus::Failed => "failed",
    }
}

pub fn parse_scrape_status(s: &str) -> ScrapeStatus {
    match s {
        "failed" => ScrapeStatus::Failed,
        _ => ScrapeStatus::Completed,
    }
}

pub fn document_type_str(d: ScrapedDocumentType) -> &'static str {
    match d {
        ScrapedDocumentType::Html => "html",
        ScrapedDocumentType::Pdf => "pdf",
        ScrapedDocumentType::Word => "word",
    }
}

pub fn parse_document_type(s: &str) -> ScrapedDocumentType {
    match s {
        "pdf" => ScrapedDocumentType::Pdf,
        "word" => ScrapedDocumentType::Word,
        _ => ScrapedDocumentType::Html,
    }
}

pub fn work_item_status_str(s: WorkItemStatus) -> &'static str {
    match s {
        WorkItemStatus::Queued => "queued",
        WorkItemStatus::Processing => "processing",
        WorkItemStatus::Completed => "completed",
        WorkItemStatus::Failed => "failed",
    }
}

pub fn parse_work_item_status(s: &str) -> WorkItemStatus {
    match s {
        "processing" => WorkItemStatus::Processing,
        "completed" => WorkItemStatus::Completed,
        "failed" => WorkItemStatus::Failed,
        _ => WorkItemStatus::Queued,
    }
}

pub fn circuit_state_str(s: CircuitState) -> &'static str {
    match s {
        CircuitState::Closed => "closed",
        CircuitState::HalfOpen => "half_open",
        CircuitState::Open => "open",
    }
}

pub fn parse_circuit_state(s: &str) -> CircuitState {
    match s {
        "half_open" => CircuitState::HalfOpen,
        "open" => CircuitState::Open,
        _ => CircuitState::Closed,
    }
}

pub fn label_str(l: MarketPositionLabel) -> &'static str {
    match l {
        MarketPositionLabel::Leader => "leader",
        MarketPositionLabel::Challenger => "challenger",
        MarketPositionLabel::Competitor => "competitor",
        MarketPositionLabel::Niche => "niche",
    }
}

pub fn parse_label(s: &str) -> MarketPositionLabel {
    match s {
        "leader" => MarketPositionLabel::Leader,
        "challenger" => MarketPositionLabel::Challenger,
        "competitor" => MarketPositionLabel::Competitor,
        _ => MarketPositionLabel::Niche,
    }
}

pub fn parse_phase_status(s: &str) -> PhaseStatusKind {
    match s {
        "running" => PhaseStatusKind::Running,
        "completed" => PhaseStatusKind::Completed,
        "failed" => PhaseStatusKind::Failed,
        "skipped" => PhaseStatusKind::Skipped,
        "blocked" => PhaseStatusKind::Blocked,
        _ => PhaseStatusKind::Pending,
    }
}

pub fn parse_phase(s: &str) -> PhaseName {
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
