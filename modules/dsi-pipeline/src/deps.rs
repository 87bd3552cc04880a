//! Explicit collaborators container assembled once at process start (§9
//! "Global singletons → explicit collaborators"). Every phase worker takes a
//! `&PipelineDeps` instead of reaching for a module-level singleton.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dsi_cache::{KeywordMetricCache, QuotaManager};
use dsi_resilience::CircuitBreakerRegistry;
use dsi_store::StateStore;
use dsi_llm_client::LlmProvider;

use crate::collaborators::{CompanyDataProvider, ScraperProvider, SearchProvider, VideoDataProvider};

pub struct PipelineDeps {
    pub store: StateStore,
    pub keyword_cache: Arc<KeywordMetricCache>,
    pub quota: Arc<QuotaManager>,
    pub circuit_breakers: Arc<CircuitBreakerRegistry>,
    pub search: Arc<dyn SearchProvider>,
    pub scraper: Arc<dyn ScraperProvider>,
    pub company_data: Arc<dyn CompanyDataProvider>,
    pub video_data: Arc<dyn VideoDataProvider>,
    pub llm: Arc<dyn LlmProvider>,
    /// Flipped by the `cancel` verb; checked at every suspension point
    /// (§5's cancellation contract).
    pub cancelled: Arc<AtomicBool>,
}

impl PipelineDeps {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::Relaxed)
    }
}
