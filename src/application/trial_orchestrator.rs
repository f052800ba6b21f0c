//! Executes one trial: every enabled scenario, in order, against one session.
//!
//! Prompts within a scenario run with bounded concurrency; results are
//! aggregated into fixed slots by prompt position so the final ordering is
//! deterministic regardless of completion order. After every completed
//! prompt the scenario and trial aggregates are recomputed and a snapshot is
//! broadcast, giving observers live partial progress.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::events::RunEvent;
use crate::application::prompt_executor::PromptExecutor;
use crate::domain::errors::{SweepError, SweepResult};
use crate::domain::models::{
    LogEntry, PromptResult, SamplingCandidate, Scenario, ScenarioResult, TrialResult, TrialStatus,
};

pub struct TrialOrchestrator {
    executor: Arc<PromptExecutor>,
    events: broadcast::Sender<RunEvent>,
}

impl TrialOrchestrator {
    pub fn new(executor: Arc<PromptExecutor>, events: broadcast::Sender<RunEvent>) -> Self {
        Self { executor, events }
    }

    fn emit(&self, trial: &TrialResult) {
        let _ = self
            .events
            .send(RunEvent::TrialUpdated(Box::new(trial.clone())));
    }

    fn log(&self, trial: &mut TrialResult, message: impl Into<String>) {
        trial.log_entries.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    /// Run every scenario for this trial against an existing session.
    ///
    /// On success the trial is left `Completed` with aggregates recomputed.
    /// Cancellation marks the trial `Cancelled`, skips everything not yet
    /// finished, and surfaces as `Err(SweepError::Cancelled)`; results of
    /// prompts that had already completed are kept.
    pub async fn run_trial(
        &self,
        trial: &mut TrialResult,
        scenarios: &[Scenario],
        session_id: &str,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> SweepResult<()> {
        trial.status = TrialStatus::Running;
        trial.started_at = Utc::now();
        let _ = self.events.send(RunEvent::TrialStarted(trial.id));
        self.log(trial, format!("trial started: {}", trial.candidate.label()));
        self.emit(trial);

        for scenario in scenarios {
            if scenario.prompts.is_empty() {
                debug!(scenario = scenario.id.as_str(), "no prompts, skipping");
                continue;
            }
            match self
                .run_scenario(trial, scenario, session_id, concurrency, cancel)
                .await
            {
                Ok(()) => {}
                Err(SweepError::Cancelled) => {
                    warn!(trial = %trial.id, "trial cancelled");
                    trial.status = TrialStatus::Cancelled;
                    trial.finished_at = Some(Utc::now());
                    trial.recompute_totals();
                    let _ = self
                        .events
                        .send(RunEvent::TrialFinished(trial.id, trial.status));
                    self.emit(trial);
                    return Err(SweepError::Cancelled);
                }
                Err(other) => return Err(other),
            }
        }

        trial.status = TrialStatus::Completed;
        trial.finished_at = Some(Utc::now());
        trial.active_prompts.clear();
        trial.recompute_totals();
        info!(
            trial = %trial.id,
            total_score = ?trial.total_score,
            "trial completed"
        );
        let _ = self
            .events
            .send(RunEvent::TrialFinished(trial.id, trial.status));
        self.emit(trial);
        Ok(())
    }

    async fn run_scenario(
        &self,
        trial: &mut TrialResult,
        scenario: &Scenario,
        session_id: &str,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> SweepResult<()> {
        debug!(
            scenario = scenario.id.as_str(),
            prompts = scenario.prompts.len(),
            concurrency,
            "scenario started"
        );
        self.log(trial, format!("scenario {} started", scenario.id.as_str()));

        let sampling: Option<SamplingCandidate> = trial.candidate.sampling().cloned();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set: JoinSet<(usize, SweepResult<PromptResult>)> = JoinSet::new();

        for (idx, prompt) in scenario.prompts.iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&semaphore);
            let prompt = prompt.clone();
            let sampling = sampling.clone();
            let session_id = session_id.to_string();
            let cancel = cancel.clone();
            trial.active_prompts.push(prompt.id.clone());
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = executor
                    .execute(&session_id, &prompt, sampling.as_ref(), &cancel)
                    .await;
                (idx, result)
            });
        }

        // Fixed slots keep aggregation order independent of completion order.
        let mut slots: Vec<Option<PromptResult>> = vec![None; scenario.prompts.len()];
        let mut cancelled = false;
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "prompt task panicked");
                    continue;
                }
            };
            let prompt_id = &scenario.prompts[idx].id;
            trial.active_prompts.retain(|p| p != prompt_id);
            match result {
                Ok(result) => {
                    self.log(
                        trial,
                        format!("prompt {} scored {:.0}", result.prompt_id, result.score),
                    );
                    slots[idx] = Some(result);
                    self.update_scenario_result(trial, scenario, &slots);
                    self.emit(trial);
                }
                Err(SweepError::Cancelled) => {
                    // In-flight partials are discarded; keep draining so
                    // sibling tasks observe the token and wind down.
                    cancelled = true;
                }
                Err(other) => return Err(other),
            }
        }

        if cancelled {
            return Err(SweepError::Cancelled);
        }
        Ok(())
    }

    fn update_scenario_result(
        &self,
        trial: &mut TrialResult,
        scenario: &Scenario,
        slots: &[Option<PromptResult>],
    ) {
        let completed: Vec<PromptResult> = slots.iter().flatten().cloned().collect();
        let result = ScenarioResult::from_results(scenario.id, completed);
        match trial
            .scenario_results
            .iter_mut()
            .find(|s| s.scenario_id == scenario.id)
        {
            Some(existing) => *existing = result,
            None => trial.scenario_results.push(result),
        }
        trial.recompute_totals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;

    use crate::domain::errors::TransportError;
    use crate::domain::models::{
        Candidate, ChatMessage, Expectation, PromptDef, SamplingCandidate as DomainSampling,
        ScenarioId,
    };
    use crate::domain::ports::{
        ChatClient, ChatCompletionChunk, ChatRequest, ChoiceDelta, ChunkChoice, ChunkStream,
    };

    struct EchoClient {
        reply: String,
    }

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn stream_chat(&self, _request: ChatRequest) -> Result<ChunkStream, TransportError> {
            let chunk = ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: ChoiceDelta {
                        content: Some(self.reply.clone()),
                        tool_calls: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            };
            Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
        }
    }

    fn orchestrator(reply: &str) -> (TrialOrchestrator, broadcast::Receiver<RunEvent>) {
        let (events, rx) = broadcast::channel(256);
        let executor = Arc::new(PromptExecutor::new(Arc::new(EchoClient {
            reply: reply.to_string(),
        })));
        (TrialOrchestrator::new(executor, events), rx)
    }

    fn chat_scenario(prompt_count: usize) -> Scenario {
        let prompts = (0..prompt_count)
            .map(|i| {
                let mut p = PromptDef::new(format!("p{i}"), vec![ChatMessage::user("say ok")]);
                p.expected = Some(Expectation::Exact {
                    value: "ok".to_string(),
                });
                p
            })
            .collect();
        Scenario {
            id: ScenarioId::Chat,
            name: "chat".to_string(),
            prompts,
        }
    }

    #[tokio::test]
    async fn completes_trial_with_deterministic_prompt_order() {
        let (orchestrator, _rx) = orchestrator("ok");
        let mut trial = TrialResult::new(Candidate::Sampling(DomainSampling::default()));

        orchestrator
            .run_trial(
                &mut trial,
                &[chat_scenario(4)],
                "s1",
                4,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(trial.status, TrialStatus::Completed);
        assert!(trial.finished_at.is_some());
        let ids: Vec<&str> = trial.scenario_results[0]
            .prompt_results
            .iter()
            .map(|r| r.prompt_id.as_str())
            .collect();
        assert_eq!(ids, vec!["p0", "p1", "p2", "p3"]);
        assert_eq!(trial.total_score, Some(100.0));
        assert!(trial.active_prompts.is_empty());
    }

    #[tokio::test]
    async fn emits_incremental_snapshots() {
        let (orchestrator, mut rx) = orchestrator("ok");
        let mut trial = TrialResult::new(Candidate::Sampling(DomainSampling::default()));

        orchestrator
            .run_trial(
                &mut trial,
                &[chat_scenario(2)],
                "s1",
                1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut snapshots = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RunEvent::TrialUpdated(_)) {
                snapshots += 1;
            }
        }
        // Initial snapshot, one per prompt, one terminal.
        assert!(snapshots >= 4);
    }

    #[tokio::test]
    async fn cancellation_marks_trial_cancelled() {
        let (orchestrator, _rx) = orchestrator("ok");
        let mut trial = TrialResult::new(Candidate::Sampling(DomainSampling::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator
            .run_trial(&mut trial, &[chat_scenario(2)], "s1", 1, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(trial.status, TrialStatus::Cancelled);
        assert!(trial.finished_at.is_some());
    }

    #[tokio::test]
    async fn empty_scenarios_are_skipped() {
        let (orchestrator, _rx) = orchestrator("ok");
        let mut trial = TrialResult::new(Candidate::Sampling(DomainSampling::default()));
        let empty = Scenario {
            id: ScenarioId::ContextFill,
            name: "fill".to_string(),
            prompts: Vec::new(),
        };

        orchestrator
            .run_trial(
                &mut trial,
                &[chat_scenario(1), empty],
                "s1",
                1,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(trial.scenario_results.len(), 1);
        assert_eq!(trial.scenario_results[0].scenario_id, ScenarioId::Chat);
    }
}
