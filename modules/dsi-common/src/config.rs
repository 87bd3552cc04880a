//! Layered configuration (§9 Design Notes): `Defaults → Persisted →
//! RequestOverride`, merged by a pure function with right-wins precedence.
//! The merged result is what gets stamped into `pipeline_runs.config_snapshot`.

use std::collections::HashSet;
use std::env;

use serde::{Deserialize, Serialize};

use crate::types::{ContentType, PhaseName};

/// Process-wide settings loaded once at boot from the environment, in the
/// `Config::from_env`-style the rest of the workspace uses.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub database_url: String,
    pub web_host: String,
    pub web_port: u16,
    pub webhook_basic_auth_user: String,
    pub webhook_basic_auth_password: String,
    pub anthropic_api_key: String,
    pub watchdog_poll_interval_secs: u64,
    pub channel_resolver_poll_interval_secs: u64,
}

impl ProcessConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            webhook_basic_auth_user: env::var("WEBHOOK_BASIC_AUTH_USER").unwrap_or_default(),
            webhook_basic_auth_password: env::var("WEBHOOK_BASIC_AUTH_PASSWORD")
                .unwrap_or_default(),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            watchdog_poll_interval_secs: env::var("WATCHDOG_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            channel_resolver_poll_interval_secs: env::var("CHANNEL_RESOLVER_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Log the first few characters of each secret for debugging without
    /// leaking it — same idiom the rest of the workspace uses.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
            ("WEBHOOK_BASIC_AUTH_PASSWORD", &self.webhook_basic_auth_password),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Per-run configuration knobs recognized per §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub keywords: Vec<String>,
    pub content_types: HashSet<ContentType>,
    pub regions: Vec<String>,
    pub enabled_phases: PhaseToggles,
    pub serp_coordinator_cutoff_minutes: i64,
    pub webhook_starts_pipeline: bool,
    pub batch_size: PhaseInt,
    pub concurrency: PhaseInt,
    pub timeout_minutes: PhaseInt,
    pub circuit_breaker: CircuitBreakerDefaults,
    pub retry: RetryDefaults,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut content_types = HashSet::new();
        content_types.insert(ContentType::Organic);

        Self {
            keywords: Vec::new(),
            content_types,
            regions: vec!["US".to_string()],
            enabled_phases: PhaseToggles::default(),
            serp_coordinator_cutoff_minutes: 15,
            webhook_starts_pipeline: true,
            batch_size: PhaseInt::uniform(50),
            concurrency: PhaseInt::uniform(10),
            timeout_minutes: PhaseInt::from_phase_defaults(),
            circuit_breaker: CircuitBreakerDefaults::default(),
            retry: RetryDefaults::default(),
        }
    }
}

/// Per-phase `enable_<phase>` toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseToggles {
    pub keyword_metrics: bool,
    pub serp_collection: bool,
    pub company_enrichment_serp: bool,
    pub video_enrichment: bool,
    pub content_scraping: bool,
    pub content_analysis: bool,
    pub company_enrichment_youtube: bool,
    pub dsi_calculation: bool,
}

impl Default for PhaseToggles {
    fn default() -> Self {
        Self {
            keyword_metrics: true,
            serp_collection: true,
            company_enrichment_serp: true,
            video_enrichment: true,
            content_scraping: true,
            content_analysis: true,
            company_enrichment_youtube: true,
            dsi_calculation: true,
        }
    }
}

impl PhaseToggles {
    pub fn is_enabled(&self, phase: PhaseName) -> bool {
        match phase {
            PhaseName::KeywordMetrics => self.keyword_metrics,
            PhaseName::SerpCollection => self.serp_collection,
            PhaseName::CompanyEnrichmentSerp => self.company_enrichment_serp,
            PhaseName::VideoEnrichment => self.video_enrichment,
            PhaseName::ContentScraping => self.content_scraping,
            PhaseName::ContentAnalysis => self.content_analysis,
            PhaseName::CompanyEnrichmentYoutube => self.company_enrichment_youtube,
            PhaseName::DsiCalculation => self.dsi_calculation,
        }
    }
}

/// A per-phase integer knob (`batch_size_<phase>`, `concurrency_<phase>`,
/// `timeout_<phase>_minutes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseInt {
    pub keyword_metrics: i64,
    pub serp_collection: i64,
    pub company_enrichment_serp: i64,
    pub video_enrichment: i64,
    pub content_scraping: i64,
    pub content_analysis: i64,
    pub company_enrichment_youtube: i64,
    pub dsi_calculation: i64,
}

impl PhaseInt {
    pub fn uniform(v: i64) -> Self {
        Self {
            keyword_metrics: v,
            serp_collection: v,
            company_enrichment_serp: v,
            video_enrichment: v,
            content_scraping: v,
            content_analysis: v,
            company_enrichment_youtube: v,
            dsi_calculation: v,
        }
    }

    pub fn from_phase_defaults() -> Self {
        Self {
            keyword_metrics: PhaseName::KeywordMetrics.default_timeout_minutes(),
            serp_collection: PhaseName::SerpCollection.default_timeout_minutes(),
            company_enrichment_serp: PhaseName::CompanyEnrichmentSerp.default_timeout_minutes(),
            video_enrichment: PhaseName::VideoEnrichment.default_timeout_minutes(),
            content_scraping: PhaseName::ContentScraping.default_timeout_minutes(),
            content_analysis: PhaseName::ContentAnalysis.default_timeout_minutes(),
            company_enrichment_youtube: PhaseName::CompanyEnrichmentYoutube
                .default_timeout_minutes(),
            dsi_calculation: PhaseName::DsiCalculation.default_timeout_minutes(),
        }
    }

    pub fn get(&self, phase: PhaseName) -> i64 {
        match phase {
            PhaseName::KeywordMetrics => self.keyword_metrics,
            PhaseName::SerpCollection => self.serp_collection,
            PhaseName::CompanyEnrichmentSerp => self.company_enrichment_serp,
            PhaseName::VideoEnrichment => self.video_enrichment,
            PhaseName::ContentScraping => self.content_scraping,
            PhaseName::ContentAnalysis => self.content_analysis,
            PhaseName::CompanyEnrichmentYoutube => self.company_enrichment_youtube,
            PhaseName::DsiCalculation => self.dsi_calculation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerDefaults {
    pub failure_threshold: u32,
    pub window_secs: i64,
    pub initial_cooldown_secs: i64,
    pub max_cooldown_secs: i64,
}

impl Default for CircuitBreakerDefaults {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_secs: 60,
            initial_cooldown_secs: 120,
            // §9 Open Question resolution: cap cooldown doubling at 30 min.
            max_cooldown_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefaults {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryDefaults {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
        }
    }
}

/// Per-`start()` call overrides. All fields optional; `None` means "inherit
/// the persisted/default value". Merging is right-wins: override beats
/// persisted beats compiled-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestOverride {
    pub content_types: Option<HashSet<ContentType>>,
    pub regions: Option<Vec<String>>,
    pub serp_coordinator_cutoff_minutes: Option<i64>,
    pub webhook_starts_pipeline: Option<bool>,
    pub disable_keyword_metrics: Option<bool>,
}

impl PipelineConfig {
    /// Merge `Defaults → Persisted (self) → RequestOverride`, right-wins.
    pub fn merge(mut self, overrides: &RequestOverride) -> Self {
        if let Some(ct) = &overrides.content_types {
            self.content_types = ct.clone();
        }
        if let Some(regions) = &overrides.regions {
            self.regions = regions.clone();
        }
        if let Some(cutoff) = overrides.serp_coordinator_cutoff_minutes {
            self.serp_coordinator_cutoff_minutes = cutoff;
        }
        if let Some(webhook) = overrides.webhook_starts_pipeline {
            self.webhook_starts_pipeline = webhook;
        }
        if overrides.disable_keyword_metrics == Some(true) {
            // §9 Open Question resolution: skip, don't remove the DAG edge.
            self.enabled_phases.keyword_metrics = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_persisted_beats_default() {
        let persisted = PipelineConfig {
            serp_coordinator_cutoff_minutes: 20,
            ..PipelineConfig::default()
        };
        let merged = persisted.merge(&RequestOverride {
            serp_coordinator_cutoff_minutes: Some(5),
            ..Default::default()
        });
        assert_eq!(merged.serp_coordinator_cutoff_minutes, 5);
    }

    #[test]
    fn no_override_keeps_persisted_value() {
        let persisted = PipelineConfig {
            serp_coordinator_cutoff_minutes: 20,
            ..PipelineConfig::default()
        };
        let merged = persisted.clone().merge(&RequestOverride::default());
        assert_eq!(merged.serp_coordinator_cutoff_minutes, 20);
    }

    #[test]
    fn disable_keyword_metrics_skips_without_removing_dag_edge() {
        let merged = PipelineConfig::default().merge(&RequestOverride {
            disable_keyword_metrics: Some(true),
            ..Default::default()
        });
        assert!(!merged.enabled_phases.keyword_metrics);
        // The DAG edge itself is structural, not config-driven.
        assert_eq!(
            PhaseName::SerpCollection.predecessors(),
            &[PhaseName::KeywordMetrics]
        );
    }
}
