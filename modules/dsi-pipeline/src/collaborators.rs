//! External collaborator contracts (§1 "deliberately out of scope",
//! specified only by the capability each must satisfy). Phase workers take
//! these as trait objects so tests substitute in-memory fakes instead of
//! hitting real providers — the same shape as `ContentFetcher`/`SignalStore`
//! in the scraping pipeline this workspace grew out of.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use dsi_common::{ContentType, HistoricalKeywordMetric};

#[derive(Debug, Clone)]
pub struct SerpHit {
    pub keyword_id: String,
    pub serp_type: ContentType,
    pub position: i32,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub estimated_traffic: Option<f64>,
}

/// Search-engine results collaborator (§4.6.1, §4.6.2).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn keyword_metrics(
        &self,
        keyword_id: &str,
        country: &str,
    ) -> Result<Option<HistoricalKeywordMetric>>;

    /// Synchronous SERP fetch for a single (keyword, region, content-type).
    async fn fetch_serp(
        &self,
        keyword_id: &str,
        region: &str,
        content_type: ContentType,
    ) -> Result<Vec<SerpHit>>;

    /// Create a batch job for (region, content-type); returns the external
    /// batch id. Results arrive later via webhook.
    async fn create_batch(&self, region: &str, content_type: ContentType, keyword_ids: &[String]) -> Result<String>;
}

pub struct MockSearchProvider {
    pub metrics: Mutex<HashMap<(String, String), HistoricalKeywordMetric>>,
    pub serp_hits: Mutex<HashMap<(String, String, ContentType), Vec<SerpHit>>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(HashMap::new()),
            serp_hits: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn keyword_metrics(&self, keyword_id: &str, country: &str) -> Result<Option<HistoricalKeywordMetric>> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(&(keyword_id.to_string(), country.to_string()))
            .cloned())
    }

    async fn fetch_serp(&self, keyword_id: &str, region: &str, content_type: ContentType) -> Result<Vec<SerpHit>> {
        Ok(self
            .serp_hits
            .lock()
            .unwrap()
            .get(&(keyword_id.to_string(), region.to_string(), content_type))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_batch(&self, _region: &str, _content_type: ContentType, _keyword_ids: &[String]) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ScrapedDocument {
    pub final_url: String,
    pub document_type: dsi_common::ScrapedDocumentType,
    pub title: String,
    pub body: String,
    pub engine: String,
    pub page_count: Option<i32>,
    pub table_count: Option<i32>,
}

/// HTML/PDF/Word scraping collaborator (§4.6.5).
#[async_trait]
pub trait ScraperProvider: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ScrapedDocument>;
}

pub struct MockScraperProvider {
    pub documents: Mutex<HashMap<String, ScrapedDocument>>,
}

impl MockScraperProvider {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockScraperProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScraperProvider for MockScraperProvider {
    async fn scrape(&self, url: &str) -> Result<ScrapedDocument> {
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no mock document registered for {url}"))
    }
}

/// Company firmographic data collaborator (§4.6.3).
#[async_trait]
pub trait CompanyDataProvider: Send + Sync {
    async fn lookup(&self, root_domain: &str) -> Result<Option<dsi_common::CompanyProfile>>;
}

pub struct MockCompanyDataProvider {
    pub profiles: Mutex<HashMap<String, dsi_common::CompanyProfile>>,
}

impl MockCompanyDataProvider {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockCompanyDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompanyDataProvider for MockCompanyDataProvider {
    async fn lookup(&self, root_domain: &str) -> Result<Option<dsi_common::CompanyProfile>> {
        Ok(self.profiles.lock().unwrap().get(root_domain).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub video_id: String,
    pub channel_id: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub duration_secs: i32,
}

/// Video-metadata collaborator (§4.6.4). Batches cost 1 quota unit per up
/// to 50 video ids.
#[async_trait]
pub trait VideoDataProvider: Send + Sync {
    async fn fetch_batch(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>>;
}

pub struct MockVideoDataProvider {
    pub videos: Mutex<HashMap<String, VideoMetadata>>,
}

impl MockVideoDataProvider {
    pub fn new() -> Self {
        Self {
            videos: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MockVideoDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoDataProvider for MockVideoDataProvider {
    async fn fetch_batch(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>> {
        let videos = self.videos.lock().unwrap();
        Ok(video_ids.iter().filter_map(|id| videos.get(id).cloned()).collect())
    }
}
