//! Process entry point: loads `ProcessConfig` from the environment, builds
//! the Postgres pool and every collaborator, then serves the control-verb
//! router while the watchdog and channel resolver tick on their own
//! intervals. Mirrors `rootsignal-server`'s `main.rs` shape minus the
//! Restate side-server it doesn't need here.

mod handlers;
mod routes;
mod state;
mod webhook_queue;

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use dsi_cache::{KeywordMetricCache, QuotaLimit, QuotaManager};
use dsi_common::config::{CircuitBreakerDefaults, PipelineConfig, ProcessConfig};
use dsi_coordinator::SerpBatchCoordinator;
use dsi_llm_client::{ClaudeClient, LlmProvider};
use dsi_pipeline::collaborators::{
    MockCompanyDataProvider, MockScraperProvider, MockSearchProvider, MockVideoDataProvider,
};
use dsi_pipeline::{Orchestrator, PipelineDeps};
use dsi_resilience::CircuitBreakerRegistry;
use dsi_store::StateStore;
use dsi_watchdog::{ChannelResolver, MockChannelInfoProvider, Supervisor};
use sqlx::postgres::PgPoolOptions;

use crate::state::AppState;

const PROBED_SERVICES: &[&str] = &["search", "scraper", "company_data", "video_data", "llm"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let process_config = ProcessConfig::from_env();
    process_config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&process_config.database_url)
        .await?;
    dsi_store::migrate(&pool).await?;

    let store = StateStore::new(pool);

    let default_config = PipelineConfig::default();

    let mut quota_limits = HashMap::new();
    quota_limits.insert("search".to_string(), QuotaLimit { daily_cap: 10_000 });
    quota_limits.insert("video".to_string(), QuotaLimit { daily_cap: 10_000 });
    let quota = Arc::new(QuotaManager::new(store.clone(), quota_limits));

    let keyword_cache = Arc::new(KeywordMetricCache::new());

    let circuit_defaults = CircuitBreakerDefaults::default();
    let circuit_breakers = Arc::new(CircuitBreakerRegistry::new(store.clone(), circuit_defaults.clone()));
    let watchdog_circuit_breakers = CircuitBreakerRegistry::new(store.clone(), circuit_defaults);

    let llm: Arc<dyn LlmProvider> = Arc::new(
        ClaudeClient::new(process_config.anthropic_api_key.clone(), "claude-sonnet-4-5"),
    );

    let deps = Arc::new(PipelineDeps {
        store: store.clone(),
        keyword_cache,
        quota,
        circuit_breakers,
        search: Arc::new(MockSearchProvider::new()),
        scraper: Arc::new(MockScraperProvider::new()),
        company_data: Arc::new(MockCompanyDataProvider::new()),
        video_data: Arc::new(MockVideoDataProvider::new()),
        llm: llm.clone(),
        cancelled: Arc::new(AtomicBool::new(false)),
    });

    let orchestrator = Arc::new(Orchestrator::new(deps.clone()));
    let coordinator = Arc::new(SerpBatchCoordinator::new(
        store.clone(),
        default_config.serp_coordinator_cutoff_minutes,
    ));

    let webhook_tx = webhook_queue::spawn_consumer(
        coordinator.clone(),
        orchestrator.clone(),
        default_config.clone(),
        256,
    );

    let app_state = AppState {
        store: store.clone(),
        orchestrator,
        deps,
        coordinator,
        default_config,
        process_config: Arc::new(process_config.clone()),
        webhook_tx,
    };

    let supervisor = Supervisor::new(
        store.clone(),
        watchdog_circuit_breakers,
        PROBED_SERVICES.iter().map(|s| s.to_string()).collect(),
        60,
        dsi_watchdog::AlertThresholds::default(),
    );
    spawn_supervisor_loop(supervisor, process_config.watchdog_poll_interval_secs);

    let resolver = ChannelResolver::new(
        store,
        llm,
        Arc::new(MockChannelInfoProvider::new()),
        5,
    );
    spawn_resolver_loop(resolver, process_config.channel_resolver_poll_interval_secs);

    let router = routes::build_router(app_state);
    let listener = tokio::net::TcpListener::bind((process_config.web_host.as_str(), process_config.web_port)).await?;
    tracing::info!(host = %process_config.web_host, port = process_config.web_port, "dsi-server listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn spawn_supervisor_loop(supervisor: Supervisor, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let report = supervisor.tick().await;
            if !report.alerts.is_empty() || !report.actions.is_empty() {
                tracing::info!(?report, "watchdog tick");
            }
        }
    });
}

fn spawn_resolver_loop(resolver: ChannelResolver, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let report = resolver.sweep().await;
            if report.attempted > 0 {
                tracing::info!(?report, "channel resolver sweep");
            }
        }
    });
}
