//! Row types for every entity the State Store owns (§3). These are plain
//! data; the store crate is the only place that knows how to read or write
//! them from Postgres.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque pipeline-run identifier.
pub type PipelineRunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    Initial,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Organic,
    News,
    Video,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Organic => "organic",
            ContentType::News => "news",
            ContentType::Video => "video",
        }
    }

    /// Extract the content type from a batch name via keyword match, per the
    /// webhook contract in §6 (`...ORGANIC|NEWS|VIDEO...`).
    pub fn from_batch_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.contains("ORGANIC") {
            Some(ContentType::Organic)
        } else if upper.contains("NEWS") {
            Some(ContentType::News)
        } else if upper.contains("VIDEO") {
            Some(ContentType::Video)
        } else {
            None
        }
    }
}

/// The 7 fixed phase kinds plus the synthetic `company_enrichment_youtube`
/// secondary step named in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    KeywordMetrics,
    SerpCollection,
    CompanyEnrichmentSerp,
    VideoEnrichment,
    ContentScraping,
    ContentAnalysis,
    CompanyEnrichmentYoutube,
    DsiCalculation,
}

impl PhaseName {
    pub const ALL: [PhaseName; 8] = [
        PhaseName::KeywordMetrics,
        PhaseName::SerpCollection,
        PhaseName::CompanyEnrichmentSerp,
        PhaseName::VideoEnrichment,
        PhaseName::ContentScraping,
        PhaseName::ContentAnalysis,
        PhaseName::CompanyEnrichmentYoutube,
        PhaseName::DsiCalculation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseName::KeywordMetrics => "keyword_metrics",
            PhaseName::SerpCollection => "serp_collection",
            PhaseName::CompanyEnrichmentSerp => "company_enrichment_serp",
            PhaseName::VideoEnrichment => "video_enrichment",
            PhaseName::ContentScraping => "content_scraping",
            PhaseName::ContentAnalysis => "content_analysis",
            PhaseName::CompanyEnrichmentYoutube => "company_enrichment_youtube",
            PhaseName::DsiCalculation => "dsi_calculation",
        }
    }

    /// Direct predecessors per the fixed DAG in §4.8.
    pub fn predecessors(self) -> &'static [PhaseName] {
        match self {
            PhaseName::KeywordMetrics => &[],
            PhaseName::SerpCollection => &[PhaseName::KeywordMetrics],
            PhaseName::CompanyEnrichmentSerp => &[PhaseName::SerpCollection],
            PhaseName::VideoEnrichment => &[PhaseName::SerpCollection],
            PhaseName::ContentScraping => &[PhaseName::SerpCollection],
            PhaseName::ContentAnalysis => &[PhaseName::CompanyEnrichmentSerp],
            PhaseName::CompanyEnrichmentYoutube => {
                &[PhaseName::VideoEnrichment, PhaseName::CompanyEnrichmentSerp]
            }
            PhaseName::DsiCalculation => {
                &[PhaseName::ContentAnalysis, PhaseName::CompanyEnrichmentYoutube]
            }
        }
    }

    /// Non-critical phases are auto-skipped on failure rather than failing
    /// the pipeline (§4.8). Only video enrichment is non-critical.
    pub fn is_non_critical(self) -> bool {
        matches!(self, PhaseName::VideoEnrichment)
    }

    /// Default timeout in minutes, per §4.9.
    pub fn default_timeout_minutes(self) -> i64 {
        match self {
            PhaseName::KeywordMetrics => 30,
            PhaseName::SerpCollection => 120,
            PhaseName::CompanyEnrichmentSerp | PhaseName::CompanyEnrichmentYoutube => 60,
            PhaseName::VideoEnrichment => 60,
            PhaseName::ContentScraping => 180,
            PhaseName::ContentAnalysis => 240,
            PhaseName::DsiCalculation => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatusKind {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Blocked,
}

impl PhaseStatusKind {
    /// A predecessor gate is satisfied by completed or skipped (§4.8).
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, PhaseStatusKind::Completed | PhaseStatusKind::Skipped)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub pipeline_run_id: PipelineRunId,
    pub phase: PhaseName,
    pub status: PhaseStatusKind,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub result: serde_json::Value,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub pipeline_run_id: PipelineRunId,
    pub phase: PhaseName,
    pub item_kind: String,
    pub item_id: String,
    pub status: WorkItemStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpBatchExpectation {
    pub project_id: String,
    pub period_date: NaiveDate,
    pub content_type: ContentType,
    pub expected: bool,
    pub received: bool,
    pub received_at: Option<DateTime<Utc>>,
    pub external_batch_id: Option<String>,
    pub result_set_id: Option<i64>,
    pub download_links: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorLock {
    pub project_id: String,
    pub period_date: NaiveDate,
    pub pipeline_run_id: Option<PipelineRunId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResultRow {
    pub pipeline_run_id: PipelineRunId,
    pub keyword_id: String,
    pub serp_type: ContentType,
    pub position: i32,
    pub url: String,
    pub domain: String,
    pub title: String,
    pub snippet: String,
    pub estimated_traffic: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapedDocumentType {
    Html,
    Pdf,
    Word,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedContentRow {
    pub pipeline_run_id: PipelineRunId,
    pub url: String,
    pub status: ScrapeStatus,
    pub final_url: String,
    pub document_type: ScrapedDocumentType,
    pub title: String,
    pub body: String,
    pub word_count: i32,
    pub engine: String,
    pub page_count: Option<i32>,
    pub table_count: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaAlignment {
    pub persona: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAnalysisRow {
    pub pipeline_run_id: PipelineRunId,
    pub url: String,
    pub summary: String,
    pub primary_persona: String,
    pub persona_scores: Vec<PersonaAlignment>,
    pub buyer_journey_phase: String,
    pub buyer_journey_score: f64,
    pub content_classification: String,
    pub source_type: String,
    pub entity_mentions: Vec<String>,
    pub sentiment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub root_domain: String,
    pub company_name: String,
    pub industry: String,
    pub size: String,
    pub technologies: Vec<String>,
    pub parent_company: Option<String>,
    pub source_type: String,
    pub profile_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalKeywordMetric {
    pub snapshot_date: NaiveDate,
    pub keyword_id: String,
    pub country: String,
    pub source: String,
    pub avg_monthly_searches: i64,
    pub competition_level: String,
    pub bid_low_cents: i64,
    pub bid_high_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub service: String,
    pub state: CircuitState,
    pub consecutive_failures: i32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub open_until: Option<DateTime<Utc>>,
    pub current_cooldown_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCounter {
    pub service: String,
    pub date: NaiveDate,
    pub units_used: i64,
    pub breakdown: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPositionLabel {
    Leader,
    Challenger,
    Competitor,
    Niche,
}

impl MarketPositionLabel {
    /// §4.6.7: DSI ≥ 50 → leader; ≥ 25 → challenger; ≥ 10 → competitor; else niche.
    /// `dsi` is expected on a 0-100 scale here (the caller scales the [0,1] score).
    pub fn from_dsi_pct(dsi_pct: f64) -> Self {
        if dsi_pct >= 50.0 {
            MarketPositionLabel::Leader
        } else if dsi_pct >= 25.0 {
            MarketPositionLabel::Challenger
        } else if dsi_pct >= 10.0 {
            MarketPositionLabel::Competitor
        } else {
            MarketPositionLabel::Niche
        }
    }
}

/// A single scraped page's contribution to its domain's company-level score
/// (§4.6.7: "success requires both company-level and page-level scores
/// written"). `contribution` is this page's share of the domain's aggregate
/// content relevance, already weighted by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsiPageScore {
    pub pipeline_run_id: PipelineRunId,
    pub content_type: ContentType,
    pub url: String,
    pub root_domain: String,
    pub content_relevance: f64,
    pub position_score: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsiCompanyScore {
    pub pipeline_run_id: PipelineRunId,
    pub content_type: ContentType,
    pub root_domain: String,
    pub keyword_coverage: f64,
    pub traffic_share: f64,
    pub content_relevance: f64,
    pub market_presence: Option<f64>,
    pub position_score: Option<f64>,
    pub dsi: f64,
    pub rank: i32,
    pub label: MarketPositionLabel,
}
