//! Scheduler/Watchdog (§4.9): a periodic sweep over in-flight runs that
//! detects phases stuck past their timeout and applies one of three
//! handlers, then raises a runtime alert once a run's total age crosses the
//! warning/critical/stuck thresholds. Modeled on the lock-acquire/run/
//! always-release supervisor loop this workspace already uses for its other
//! periodic sweeps, minus the lock: a watchdog tick is read-mostly and safe
//! to run from more than one process at once (phase transitions are
//! optimistic, so a racing tick just loses the compare-and-swap).

use chrono::Utc;
use dsi_common::{PhaseName, PhaseStatusKind, PipelineRunId, PipelineStatus};
use dsi_resilience::CircuitBreakerRegistry;
use dsi_store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Send the phase back to `pending` so the orchestrator re-dispatches it
    /// on its next drive.
    RestartPhase,
    /// Force the phase to `completed` with whatever it already wrote —
    /// reserved for phases whose downstream consumers tolerate partial
    /// output (content analysis, video enrichment, the youtube resolver
    /// step).
    CompleteWithProgress,
    /// Leave the phase alone and surface it for an operator to look at —
    /// reserved for the phase no other phase can route around.
    Escalate,
}

fn action_for(phase: PhaseName) -> TimeoutAction {
    match phase {
        PhaseName::ContentAnalysis
        | PhaseName::VideoEnrichment
        | PhaseName::CompanyEnrichmentYoutube => TimeoutAction::CompleteWithProgress,
        PhaseName::DsiCalculation => TimeoutAction::Escalate,
        _ => TimeoutAction::RestartPhase,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub warning_hours: i64,
    pub critical_hours: i64,
    pub stuck_hours: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self { warning_hours: 6, critical_hours: 12, stuck_hours: 24 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Warning,
    Critical,
    Stuck,
}

#[derive(Debug, Clone)]
pub struct RuntimeAlert {
    pub run_id: PipelineRunId,
    pub level: AlertLevel,
    pub age_hours: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutActionTaken {
    pub run_id: PipelineRunId,
    pub phase: PhaseName,
    pub action: TimeoutAction,
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub alerts: Vec<RuntimeAlert>,
    pub actions: Vec<TimeoutActionTaken>,
}

pub struct Supervisor {
    store: StateStore,
    circuit_breakers: CircuitBreakerRegistry,
    probed_services: Vec<String>,
    phase_timeout_minutes: i64,
    thresholds: AlertThresholds,
}

impl Supervisor {
    pub fn new(
        store: StateStore,
        circuit_breakers: CircuitBreakerRegistry,
        probed_services: Vec<String>,
        phase_timeout_minutes: i64,
        thresholds: AlertThresholds,
    ) -> Self {
        Self { store, circuit_breakers, probed_services, phase_timeout_minutes, thresholds }
    }

    /// One sweep. Each sub-step is independently fallible and logged rather
    /// than allowed to abort the rest of the tick — a failure probing one
    /// circuit breaker, or reading one run's phases, shouldn't stop the
    /// sweep from handling every other run.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for service in &self.probed_services {
            if let Err(e) = self.circuit_breakers.admit(service).await {
                tracing::warn!(error = %e, service, "circuit breaker probe failed");
            }
        }

        let running = match self.store.list_by_status(PipelineStatus::Running).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list running pipeline runs");
                return report;
            }
        };

        for run in running {
            let anchor = run.started_at.unwrap_or(run.created_at);
            let age_hours = Utc::now().signed_duration_since(anchor).num_hours();
            if let Some(level) = self.alert_level(age_hours) {
                report.alerts.push(RuntimeAlert { run_id: run.id, level, age_hours });
                tracing::warn!(run_id = %run.id, age_hours, ?level, "pipeline run runtime alert");
            }

            let phases = match self.store.list_phases(run.id).await {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(error = %e, run_id = %run.id, "failed to list phases");
                    continue;
                }
            };

            for phase in phases.into_iter().filter(|p| p.status == PhaseStatusKind::Running) {
                let Some(started) = phase.started_at else { continue };
                let minutes = Utc::now().signed_duration_since(started).num_minutes();
                if minutes < self.phase_timeout_minutes {
                    continue;
                }

                let action = action_for(phase.phase);
                let outcome = self.apply(run.id, phase.phase, action).await;
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, run_id = %run.id, phase = phase.phase.as_str(), "timeout handler failed");
                    continue;
                }
                report.actions.push(TimeoutActionTaken { run_id: run.id, phase: phase.phase, action });
            }
        }

        report
    }

    fn alert_level(&self, age_hours: i64) -> Option<AlertLevel> {
        if age_hours >= self.thresholds.stuck_hours {
            Some(AlertLevel::Stuck)
        } else if age_hours >= self.thresholds.critical_hours {
            Some(AlertLevel::Critical)
        } else if age_hours >= self.thresholds.warning_hours {
            Some(AlertLevel::Warning)
        } else {
            None
        }
    }

    async fn apply(&self, run_id: PipelineRunId, phase: PhaseName, action: TimeoutAction) -> anyhow::Result<()> {
        match action {
            TimeoutAction::RestartPhase => {
                self.store
                    .transition_phase(
                        run_id,
                        phase,
                        PhaseStatusKind::Running,
                        PhaseStatusKind::Pending,
                        Some(serde_json::json!({ "watchdog_restart": true })),
                        Some("watchdog: phase exceeded its timeout and was restarted"),
                    )
                    .await?;
            }
            TimeoutAction::CompleteWithProgress => {
                self.store.force_complete_phase(run_id, phase).await?;
            }
            TimeoutAction::Escalate => {
                tracing::error!(run_id = %run_id, phase = phase.as_str(), "phase stuck past timeout, escalating to operator");
            }
        }
        Ok(())
    }
}
