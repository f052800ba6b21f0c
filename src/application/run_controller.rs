//! Run lifecycle state machine.
//!
//! Drives one sweep run end to end: candidate generation, template probing,
//! context-fill calibration, the trial loop, best-trial selection, and the
//! handoff to history. Every terminal path lands in exactly one of
//! `completed`, `cancelled`, or `error`; local failures (one bad prompt, one
//! bad candidate) are absorbed into results and never abort the run.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::events::RunEvent;
use crate::application::prompt_executor::PromptExecutor;
use crate::application::trial_orchestrator::TrialOrchestrator;
use crate::domain::errors::SweepError;
use crate::domain::models::{
    BestConfigWeights, Candidate, ConfigCandidate, Run, RunStatus, Scenario, ScenarioId,
    SweepDefinition, TrialResult, TrialStatus,
};
use crate::domain::ports::{CreateSessionRequest, SessionClient, TemplateMode};
use crate::services::composite_scorer::select_best;
use crate::services::scenario_library::{builtin_scenarios, fill_prompts, weather_probe_prompt};
use crate::services::{candidate_generator, HistoryStore};

/// Per-run settings resolved from configuration before start.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub model_id: String,
    /// Existing session that sampling-mode trials (and the template probe)
    /// run against.
    pub session_id: Option<String>,
    /// Chat template override for ephemeral sessions.
    pub template: Option<TemplateMode>,
    /// Context window of the active session, when known. Enables
    /// sampling-mode fill calibration.
    pub context_window: Option<u32>,
}

pub struct RunController {
    sessions: Arc<dyn SessionClient>,
    executor: Arc<PromptExecutor>,
    orchestrator: TrialOrchestrator,
    history: Arc<HistoryStore>,
    events: broadcast::Sender<RunEvent>,
    settings: RunSettings,
}

impl RunController {
    pub fn new(
        sessions: Arc<dyn SessionClient>,
        executor: Arc<PromptExecutor>,
        history: Arc<HistoryStore>,
        events: broadcast::Sender<RunEvent>,
        settings: RunSettings,
    ) -> Self {
        let orchestrator = TrialOrchestrator::new(Arc::clone(&executor), events.clone());
        Self {
            sessions,
            executor,
            orchestrator,
            history,
            events,
            settings,
        }
    }

    fn set_status(&self, run: &mut Run, status: RunStatus) {
        run.status = status;
        let _ = self.events.send(RunEvent::StatusChanged(status));
    }

    /// Execute one run to a terminal state.
    ///
    /// Never returns an error: validation failures become status `error`,
    /// cancellation becomes status `cancelled`. The terminal run is handed
    /// to history when at least one trial was attempted; a failed save is
    /// logged, never surfaced as a run failure.
    pub async fn execute(
        &self,
        definition: SweepDefinition,
        weights: BestConfigWeights,
        cancel: CancellationToken,
    ) -> Run {
        let mut scenarios = builtin_scenarios();
        let mut run = Run::new(
            definition.mode(),
            scenarios.iter().map(|s| s.id).collect(),
            weights,
        );
        run.model_id = Some(self.settings.model_id.clone());

        let candidates = match candidate_generator::generate(&definition) {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = %err, "candidate generation failed");
                run.error = Some(err.to_string());
                self.set_status(&mut run, RunStatus::Error);
                return self.finish(run).await;
            }
        };
        if matches!(definition, SweepDefinition::Sampling(_)) && self.settings.session_id.is_none()
        {
            run.error = Some("sampling sweep requires an active session".to_string());
            self.set_status(&mut run, RunStatus::Error);
            return self.finish(run).await;
        }
        info!(candidates = candidates.len(), mode = ?run.kind, "run started");

        self.set_status(&mut run, RunStatus::RepairingTemplate);
        match self.probe_template(&candidates, &cancel).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("template probe produced no valid tool call, disabling tool scenario");
                scenarios.retain(|s| s.id != ScenarioId::ToolCall);
                run.scenarios.retain(|id| *id != ScenarioId::ToolCall);
            }
            Err(SweepError::Cancelled) => {
                self.set_status(&mut run, RunStatus::Cancelled);
                return self.finish(run).await;
            }
            Err(err) => {
                // Probe transport trouble is not fatal; the tool scenario
                // will surface it per-prompt.
                warn!(error = %err, "template probe errored, keeping tool scenario");
            }
        }

        // Sampling-mode calibration happens once, against the known session
        // context window. Config mode recalibrates per ephemeral session.
        if let Some(context_window) = self.settings.context_window {
            set_fill_prompts(&mut scenarios, context_window);
        }

        self.set_status(&mut run, RunStatus::RunningTrials);
        let mut cancelled = false;
        for candidate in candidates {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let trial = self.run_candidate(candidate, &scenarios, &cancel).await;
            let trial_cancelled = trial.status == TrialStatus::Cancelled;
            run.trials.push(trial);
            if trial_cancelled {
                cancelled = true;
                break;
            }
        }

        run.best_trial_id = select_best(&run.trials, &run.weights);
        let terminal = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.set_status(&mut run, terminal);
        self.finish(run).await
    }

    /// Run one candidate to a terminal trial.
    ///
    /// Config candidates get an ephemeral session created before and deleted
    /// after, unconditionally. A session failure records a completed trial
    /// with score 0 and an error note rather than aborting the run.
    async fn run_candidate(
        &self,
        candidate: Candidate,
        scenarios: &[Scenario],
        cancel: &CancellationToken,
    ) -> TrialResult {
        let mut trial = TrialResult::new(candidate.clone());
        match candidate {
            Candidate::Sampling(_) => {
                // Presence checked before the trial loop.
                let session_id = self.settings.session_id.clone().unwrap_or_default();
                let outcome = self
                    .orchestrator
                    .run_trial(&mut trial, scenarios, &session_id, 1, cancel)
                    .await;
                absorb_outcome(&mut trial, outcome);
            }
            Candidate::Config(config) => {
                self.run_config_candidate(&mut trial, config, scenarios, cancel)
                    .await;
            }
        }
        trial
    }

    async fn run_config_candidate(
        &self,
        trial: &mut TrialResult,
        config: ConfigCandidate,
        scenarios: &[Scenario],
        cancel: &CancellationToken,
    ) {
        let request = CreateSessionRequest {
            model_id: self.settings.model_id.clone(),
            template: self.settings.template.clone(),
            config: config.clone(),
        };
        let session = match self.sessions.create(request).await {
            Ok(session) => session,
            Err(err) => {
                warn!(config = %config.label(), error = %err, "session creation failed");
                mark_failed_completed(trial, format!("session creation failed: {err}"));
                return;
            }
        };
        debug!(
            session = %session.session_id,
            context_window = session.effective_config.context_window,
            "ephemeral session created"
        );

        let mut scenarios = scenarios.to_vec();
        set_fill_prompts(&mut scenarios, session.effective_config.context_window);
        let concurrency = session.effective_config.n_seq_max.max(1) as usize;

        let outcome = self
            .orchestrator
            .run_trial(trial, &scenarios, &session.session_id, concurrency, cancel)
            .await;

        // Cleanup happens on every path, including cancellation.
        if let Err(err) = self.sessions.delete(&session.session_id).await {
            warn!(session = %session.session_id, error = %err, "session cleanup failed");
        }
        absorb_outcome(trial, outcome);
    }

    /// Probe whether the session's chat template can emit tool calls at all.
    ///
    /// Returns `Ok(false)` when the probe response carries no call to the
    /// declared tool, which disables the tool scenario for the whole run.
    async fn probe_template(
        &self,
        candidates: &[Candidate],
        cancel: &CancellationToken,
    ) -> Result<bool, SweepError> {
        let probe = weather_probe_prompt();
        let result = match &self.settings.session_id {
            Some(session_id) => self.executor.execute(session_id, &probe, None, cancel).await?,
            None => {
                // Config mode has no standing session; borrow the first
                // candidate's config for a short-lived probe session.
                let Some(Candidate::Config(config)) = candidates.first() else {
                    return Ok(true);
                };
                let request = CreateSessionRequest {
                    model_id: self.settings.model_id.clone(),
                    template: self.settings.template.clone(),
                    config: config.clone(),
                };
                let session = self.sessions.create(request).await?;
                let outcome = self
                    .executor
                    .execute(&session.session_id, &probe, None, cancel)
                    .await;
                if let Err(err) = self.sessions.delete(&session.session_id).await {
                    warn!(error = %err, "probe session cleanup failed");
                }
                outcome?
            }
        };
        let valid = result
            .tool_calls
            .iter()
            .any(|call| probe.tools.iter().any(|tool| tool.name == call.name));
        debug!(valid, score = result.score, "template probe finished");
        Ok(valid)
    }

    async fn finish(&self, run: Run) -> Run {
        let _ = self.events.send(RunEvent::RunFinished(run.status));
        info!(run = %run.run_id, status = run.status.as_str(), "run finished");
        if run.attempted_any_trial() {
            if let Err(err) = self.history.save(run.clone()).await {
                // Persistence trouble never fails the run itself.
                warn!(error = %err, "unable to save run to history");
            }
        }
        run
    }
}

fn set_fill_prompts(scenarios: &mut [Scenario], context_window: u32) {
    if let Some(fill) = scenarios
        .iter_mut()
        .find(|s| s.id == ScenarioId::ContextFill)
    {
        fill.prompts = fill_prompts(context_window);
    }
}

fn mark_failed_completed(trial: &mut TrialResult, message: String) {
    trial.status = TrialStatus::Completed;
    trial.finished_at = Some(chrono::Utc::now());
    trial.total_score = Some(0.0);
    trial.error = Some(message);
}

fn absorb_outcome(trial: &mut TrialResult, outcome: Result<(), SweepError>) {
    match outcome {
        Ok(()) | Err(SweepError::Cancelled) => {}
        Err(err) => mark_failed_completed(trial, err.to_string()),
    }
}
