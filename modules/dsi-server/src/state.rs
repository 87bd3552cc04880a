//! Shared application state handed to every axum handler, mirroring the
//! `AppState`/`ServerDeps` shape the teacher's axum server builds around a
//! single pool and a set of already-constructed collaborators.

use std::sync::Arc;

use dsi_common::config::{PipelineConfig, ProcessConfig};
use dsi_coordinator::SerpBatchCoordinator;
use dsi_pipeline::{Orchestrator, PipelineDeps};
use dsi_store::StateStore;
use tokio::sync::mpsc;

use crate::webhook_queue::WebhookJob;

#[derive(Clone)]
pub struct AppState {
    pub store: StateStore,
    pub orchestrator: Arc<Orchestrator>,
    pub deps: Arc<PipelineDeps>,
    pub coordinator: Arc<SerpBatchCoordinator>,
    pub default_config: PipelineConfig,
    pub process_config: Arc<ProcessConfig>,
    pub webhook_tx: mpsc::Sender<WebhookJob>,
}
