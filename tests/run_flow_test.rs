//! End-to-end run lifecycle tests with scripted chat and session doubles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tempfile::TempDir;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use tunesmith::domain::errors::TransportError;
use tunesmith::domain::models::{
    AxisRange, BestConfigWeights, ConfigSweep, SamplingAxis, SamplingCandidate, SamplingSweep,
    ScenarioId, SweepDefinition,
};
use tunesmith::domain::ports::{
    ChatClient, ChatCompletionChunk, ChatRequest, ChoiceDelta, ChunkChoice, ChunkStream,
    CreateSessionRequest, EffectiveConfig, FunctionDelta, SessionClient, SessionInfo,
    ToolCallDelta,
};
use tunesmith::infrastructure::history::FlatFileHistoryRepo;
use tunesmith::services::HistoryStore;
use tunesmith::{
    PromptExecutor, RunController, RunEvent, RunManager, RunSettings, RunStatus, SweepError,
    TrialStatus,
};

/// Chat double: answers tool-bearing prompts with a scripted tool call (or
/// nothing) and everything else with a fixed text, after a small delay so
/// cancellation tests have something in flight.
struct ScriptedChat {
    reply: String,
    emit_tool_call: bool,
    delay: Duration,
}

impl ScriptedChat {
    fn new(reply: &str, emit_tool_call: bool) -> Self {
        Self {
            reply: reply.to_string(),
            emit_tool_call,
            delay: Duration::from_millis(10),
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        tokio::time::sleep(self.delay).await;
        let chunk = if request.tools.is_some() && self.emit_tool_call {
            ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: ChoiceDelta {
                        content: None,
                        tool_calls: Some(vec![ToolCallDelta {
                            index: 0,
                            id: Some("call_1".to_string()),
                            kind: Some("function".to_string()),
                            function: Some(FunctionDelta {
                                name: Some("get_weather".to_string()),
                                arguments: Some(r#"{"location":"Oslo"}"#.to_string()),
                            }),
                        }]),
                    },
                    finish_reason: Some("tool_calls".to_string()),
                }],
                usage: None,
            }
        } else {
            ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: ChoiceDelta {
                        content: Some(self.reply.clone()),
                        tool_calls: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            }
        };
        Ok(Box::pin(stream::iter(vec![Ok(chunk)])))
    }
}

/// Session double recording the create/delete sequence.
#[derive(Default)]
struct RecordingSessions {
    calls: Mutex<Vec<String>>,
    fail_create: AtomicBool,
    counter: AtomicUsize,
}

#[async_trait]
impl SessionClient for RecordingSessions {
    async fn create(&self, _request: CreateSessionRequest) -> Result<SessionInfo, TransportError> {
        if self.fail_create.load(Ordering::SeqCst) {
            self.calls.lock().await.push("create-failed".to_string());
            return Err(TransportError::Http {
                status: 500,
                body: "out of memory".to_string(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("sess-{n}");
        self.calls.lock().await.push(format!("create {session_id}"));
        Ok(SessionInfo {
            session_id,
            effective_config: EffectiveConfig {
                context_window: 4096,
                n_seq_max: 2,
            },
        })
    }

    async fn delete(&self, session_id: &str) -> Result<(), TransportError> {
        self.calls.lock().await.push(format!("delete {session_id}"));
        Ok(())
    }
}

struct Harness {
    controller: Arc<RunController>,
    sessions: Arc<RecordingSessions>,
    events: broadcast::Receiver<RunEvent>,
    store: Arc<HistoryStore>,
    _dir: TempDir,
}

fn harness(chat: ScriptedChat, session_id: Option<&str>) -> Harness {
    let dir = TempDir::new().unwrap();
    let fallback = Arc::new(FlatFileHistoryRepo::new(dir.path().join("history.json")));
    let store = Arc::new(HistoryStore::new(None, fallback, 500));
    let sessions = Arc::new(RecordingSessions::default());
    let (events, event_rx) = broadcast::channel(1024);
    let controller = Arc::new(RunController::new(
        Arc::clone(&sessions) as Arc<dyn SessionClient>,
        Arc::new(PromptExecutor::new(Arc::new(chat))),
        Arc::clone(&store),
        events,
        RunSettings {
            model_id: "test-model".to_string(),
            session_id: session_id.map(String::from),
            template: None,
            context_window: None,
        },
    ));
    Harness {
        controller,
        sessions,
        events: event_rx,
        store,
        _dir: dir,
    }
}

fn sampling_sweep(temperatures: AxisRange) -> SweepDefinition {
    let mut axes = BTreeMap::new();
    axes.insert(SamplingAxis::Temperature, temperatures);
    SweepDefinition::Sampling(SamplingSweep {
        baseline: SamplingCandidate {
            temperature: Some(0.8),
            ..Default::default()
        },
        axes,
        enable_thinking: Vec::new(),
        reasoning_effort: Vec::new(),
    })
}

#[tokio::test]
async fn sampling_run_completes_and_persists() {
    let mut h = harness(ScriptedChat::new("42", true), Some("main"));
    let run = h
        .controller
        .execute(
            sampling_sweep(AxisRange::new(0.2, 0.6, 0.4)),
            BestConfigWeights::total_score_only(),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    // Baseline plus 0.2 and 0.6.
    assert_eq!(run.trials.len(), 3);
    assert!(run
        .trials
        .iter()
        .all(|t| t.status == TrialStatus::Completed));
    assert!(run.best_trial_id.is_some());

    // Handed to history on the terminal transition.
    let entries = h.store.load().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, run.run_id);

    // Terminal status event observed.
    let mut saw_finished = false;
    while let Ok(event) = h.events.try_recv() {
        if matches!(event, RunEvent::RunFinished(RunStatus::Completed)) {
            saw_finished = true;
        }
    }
    assert!(saw_finished);
}

#[tokio::test]
async fn failed_probe_disables_tool_scenario_for_whole_run() {
    let h = harness(ScriptedChat::new("chat only", false), Some("main"));
    let run = h
        .controller
        .execute(
            sampling_sweep(AxisRange::pinned(0.8)),
            BestConfigWeights::total_score_only(),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(!run.scenarios.contains(&ScenarioId::ToolCall));
    for trial in &run.trials {
        assert!(trial
            .scenario_results
            .iter()
            .all(|s| s.scenario_id != ScenarioId::ToolCall));
    }
}

#[tokio::test]
async fn cancellation_preserves_completed_trials() {
    let mut chat = ScriptedChat::new("42", true);
    chat.delay = Duration::from_millis(30);
    let h = harness(chat, Some("main"));

    let cancel = CancellationToken::new();
    let mut events = h.events.resubscribe();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut started = 0;
            while let Ok(event) = events.recv().await {
                if matches!(event, RunEvent::TrialStarted(_)) {
                    started += 1;
                    if started == 2 {
                        cancel.cancel();
                        break;
                    }
                }
            }
        })
    };

    let run = h
        .controller
        .execute(
            sampling_sweep(AxisRange::new(0.2, 1.0, 0.2)),
            BestConfigWeights::total_score_only(),
            cancel,
        )
        .await;
    canceller.await.unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.trials[0].status, TrialStatus::Completed);
    let cancelled = run
        .trials
        .iter()
        .filter(|t| t.status == TrialStatus::Cancelled)
        .count();
    assert_eq!(cancelled, 1, "exactly the in-flight trial is cancelled");
    assert!(
        run.trials.len() < 5,
        "remaining candidates are skipped, not attempted"
    );

    // A cancelled run that attempted trials is still persisted.
    assert_eq!(h.store.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn config_run_creates_and_deletes_one_session_per_candidate() {
    let h = harness(ScriptedChat::new("42", true), None);
    let definition = SweepDefinition::Config(ConfigSweep {
        n_batch: vec![1024],
        n_ubatch: vec![256, 512],
        ..Default::default()
    });

    let run = h
        .controller
        .execute(
            definition,
            BestConfigWeights::total_score_only(),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.trials.len(), 2);

    let calls = h.sessions.calls.lock().await;
    // Probe session plus one per candidate, each deleted.
    let creates = calls.iter().filter(|c| c.starts_with("create")).count();
    let deletes = calls.iter().filter(|c| c.starts_with("delete")).count();
    assert_eq!(creates, 3);
    assert_eq!(deletes, 3);
}

#[tokio::test]
async fn session_failure_records_scored_zero_trial_and_continues() {
    let h = harness(ScriptedChat::new("42", true), None);
    h.sessions.fail_create.store(true, Ordering::SeqCst);
    let definition = SweepDefinition::Config(ConfigSweep {
        n_ubatch: vec![256, 512],
        ..Default::default()
    });

    let run = h
        .controller
        .execute(
            definition,
            BestConfigWeights::total_score_only(),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.trials.len(), 2);
    for trial in &run.trials {
        assert_eq!(trial.status, TrialStatus::Completed);
        assert_eq!(trial.total_score, Some(0.0));
        assert!(trial.error.as_deref().unwrap().contains("session creation"));
    }
    // Scored-zero trials still compete for selection.
    assert!(run.best_trial_id.is_some());
}

#[tokio::test]
async fn invalid_sweep_definition_ends_in_error_without_history() {
    let h = harness(ScriptedChat::new("42", true), Some("main"));
    let definition = sampling_sweep(AxisRange::new(1.0, 0.2, 0.4));

    let run = h
        .controller
        .execute(
            definition,
            BestConfigWeights::total_score_only(),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(run.status, RunStatus::Error);
    assert!(run.error.is_some());
    assert!(run.trials.is_empty());
    assert!(h.store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let mut chat = ScriptedChat::new("42", true);
    chat.delay = Duration::from_millis(50);
    let h = harness(chat, Some("main"));
    let manager = RunManager::new(Arc::clone(&h.controller));

    manager
        .start(
            sampling_sweep(AxisRange::new(0.2, 1.0, 0.2)),
            BestConfigWeights::total_score_only(),
        )
        .await
        .unwrap();
    let second = manager
        .start(
            sampling_sweep(AxisRange::pinned(0.8)),
            BestConfigWeights::total_score_only(),
        )
        .await;
    assert!(matches!(second, Err(SweepError::AlreadyRunning)));

    manager.cancel().await;
    let run = manager.wait().await.unwrap();
    assert!(matches!(
        run.status,
        RunStatus::Cancelled | RunStatus::Completed
    ));

    // A finished run frees the slot.
    manager
        .start(
            sampling_sweep(AxisRange::pinned(0.8)),
            BestConfigWeights::total_score_only(),
        )
        .await
        .unwrap();
    manager.cancel().await;
    manager.wait().await.unwrap();
}

#[tokio::test]
async fn waiting_keeps_the_single_run_slot_occupied() {
    let mut chat = ScriptedChat::new("42", true);
    chat.delay = Duration::from_millis(50);
    let h = harness(chat, Some("main"));
    let manager = Arc::new(RunManager::new(Arc::clone(&h.controller)));

    manager
        .start(
            sampling_sweep(AxisRange::new(0.2, 1.0, 0.2)),
            BestConfigWeights::total_score_only(),
        )
        .await
        .unwrap();
    let waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A pending wait must not release the slot while trials execute.
    assert!(manager.is_running().await);
    let second = manager
        .start(
            sampling_sweep(AxisRange::pinned(0.8)),
            BestConfigWeights::total_score_only(),
        )
        .await;
    assert!(matches!(second, Err(SweepError::AlreadyRunning)));

    manager.cancel().await;
    let run = waiter.await.unwrap().unwrap();
    assert!(run.status.is_terminal());
    assert!(!manager.is_running().await);
}
