//! Control-verb and webhook handlers (§6). Response bodies are small DTOs
//! rather than the store's domain rows directly, the same separation the
//! teacher's GraphQL `types.rs` modules keep between a domain struct and
//! its wire representation.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use base64::Engine;
use chrono::NaiveDate;
use dsi_common::{PhaseName, PipelineRunId};
use dsi_coordinator::WebhookPayload;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;
use crate::webhook_queue::WebhookJob;

fn parse_phase(name: &str) -> Option<PhaseName> {
    Some(match name {
        "keyword_metrics" => PhaseName::KeywordMetrics,
        "serp_collection" => PhaseName::SerpCollection,
        "company_enrichment_serp" => PhaseName::CompanyEnrichmentSerp,
        "video_enrichment" => PhaseName::VideoEnrichment,
        "content_scraping" => PhaseName::ContentScraping,
        "content_analysis" => PhaseName::ContentAnalysis,
        "company_enrichment_youtube" => PhaseName::CompanyEnrichmentYoutube,
        "dsi_calculation" => PhaseName::DsiCalculation,
        _ => return None,
    })
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct StartResponse {
    pub run_id: Option<PipelineRunId>,
    pub state: &'static str,
}

pub async fn start(
    State(state): State<AppState>,
    Path((project_id, period_date)): Path<(String, NaiveDate)>,
) -> Json<StartResponse> {
    let config_snapshot = serde_json::to_value(&state.default_config).unwrap_or(json!({}));
    match state
        .coordinator
        .try_start(&project_id, period_date, dsi_common::PipelineMode::Initial, config_snapshot)
        .await
    {
        Ok(dsi_coordinator::IntakeOutcome::Started { run, .. }) => {
            let orchestrator = state.orchestrator.clone();
            let config = state.default_config.clone();
            let run_id = run.id;
            tokio::spawn(async move {
                if let Err(e) = orchestrator.drive(run_id, &config).await {
                    tracing::error!(error = %e, run_id = %run_id, "driven run ended in error");
                }
            });
            Json(StartResponse { run_id: Some(run.id), state: "started" })
        }
        Ok(dsi_coordinator::IntakeOutcome::Waiting { .. }) => {
            Json(StartResponse { run_id: None, state: "waiting_on_batches" })
        }
        Ok(dsi_coordinator::IntakeOutcome::AlreadyRunning) => {
            Json(StartResponse { run_id: None, state: "already_running" })
        }
        Err(e) => {
            tracing::warn!(error = %e, project_id, %period_date, "manual start failed");
            Json(StartResponse { run_id: None, state: "error" })
        }
    }
}

#[derive(Serialize)]
pub struct RunStatusResponse {
    pub id: PipelineRunId,
    pub status: String,
    pub project_id: String,
    pub mode: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub errors: serde_json::Value,
}

pub async fn status(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunStatusResponse>, StatusCode> {
    let run = state.store.fetch_pipeline_run(run_id).await.map_err(|e| {
        tracing::warn!(error = %e, "fetch_pipeline_run failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let run = run.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(RunStatusResponse {
        id: run.id,
        status: format!("{:?}", run.status).to_lowercase(),
        project_id: run.project_id,
        mode: format!("{:?}", run.mode).to_lowercase(),
        started_at: run.started_at,
        completed_at: run.completed_at,
        errors: run.errors,
    }))
}

#[derive(Serialize)]
pub struct PhaseResponse {
    pub phase: &'static str,
    pub status: String,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

pub async fn phases(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Vec<PhaseResponse>>, StatusCode> {
    let phases = state.store.list_phases(run_id).await.map_err(|e| {
        tracing::warn!(error = %e, "list_phases failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(
        phases
            .into_iter()
            .map(|p| PhaseResponse {
                phase: p.phase.as_str(),
                status: format!("{:?}", p.status).to_lowercase(),
                attempt_count: p.attempt_count,
                last_error: p.last_error,
            })
            .collect(),
    ))
}

pub async fn activity(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Vec<serde_json::Value>>, StatusCode> {
    let events = state.store.events().read_by_run(&run_id.to_string()).await.map_err(|e| {
        tracing::warn!(error = %e, "read_by_run failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(events.into_iter().map(|e| json!({
        "seq": e.seq,
        "ts": e.ts,
        "event_type": e.event_type,
        "payload": e.payload,
    })).collect()))
}

pub async fn resume(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> StatusCode {
    if let Err(e) = state.orchestrator.recover_stale(0).await {
        tracing::warn!(error = %e, "recover_stale failed");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let orchestrator = state.orchestrator.clone();
    let config = state.default_config.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.drive(run_id, &config).await {
            tracing::error!(error = %e, run_id = %run_id, "resumed run ended in error");
        }
    });
    StatusCode::ACCEPTED
}

pub async fn cancel(State(state): State<AppState>, Path(_run_id): Path<Uuid>) -> StatusCode {
    state.orchestrator.cancel();
    StatusCode::ACCEPTED
}

pub async fn force_complete(
    State(state): State<AppState>,
    Path((run_id, phase_name)): Path<(Uuid, String)>,
) -> StatusCode {
    let Some(phase) = parse_phase(&phase_name) else {
        return StatusCode::BAD_REQUEST;
    };
    match state.orchestrator.force_complete(run_id, phase).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "force_complete failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn webhook_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let expected_user = &state.process_config.webhook_basic_auth_user;
    if expected_user.is_empty() {
        return true;
    }
    let Some(auth) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(encoded) = auth.strip_prefix("Basic ") else { return false };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else { return false };
    let Ok(decoded) = String::from_utf8(decoded) else { return false };
    let expected = format!("{}:{}", expected_user, state.process_config.webhook_basic_auth_password);
    decoded == expected
}

/// Validates and enqueues a SERP batch webhook, then returns immediately
/// (§6: must respond within 5s regardless of downstream coordinator work).
pub async fn webhook(
    State(state): State<AppState>,
    Path((project_id, period_date)): Path<(String, NaiveDate)>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    if !webhook_authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED;
    }
    if !payload.is_recognized_type() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    if dsi_common::ContentType::from_batch_name(&payload.batch.name).is_none() {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    let job = WebhookJob { project_id, period_date, payload };
    match state.webhook_tx.try_send(job) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::error!(error = %e, "webhook queue full or closed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

