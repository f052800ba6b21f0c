//! History store integration tests against real SQLite files and flat-file
//! fallbacks.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use tunesmith::domain::models::{
    BestConfigWeights, Candidate, HistoryEntry, Run, RunStatus, SamplingCandidate, ScenarioId,
    SweepMode, TrialStatus,
};
use tunesmith::infrastructure::history::{open_history_store, FlatFileHistoryRepo};
use tunesmith::services::HistoryStore;
use tunesmith::TrialResult;

fn completed_run() -> Run {
    let mut run = Run::new(
        SweepMode::Sampling,
        vec![ScenarioId::Chat],
        BestConfigWeights::total_score_only(),
    );
    let mut trial = TrialResult::new(Candidate::Sampling(SamplingCandidate::default()));
    trial.status = TrialStatus::Completed;
    trial.finished_at = Some(Utc::now());
    trial.total_score = Some(90.0);
    trial.active_prompts.push("in-flight".to_string());
    run.trials.push(trial);
    run.status = RunStatus::Completed;
    run
}

fn db_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite:{}", dir.path().join(name).display())
}

async fn sqlite_store(dir: &TempDir, max_entries: usize) -> HistoryStore {
    let fallback = dir.path().join("fallback.json");
    open_history_store(
        &db_url(dir, "history.db"),
        fallback.to_str().unwrap(),
        max_entries,
    )
    .await
}

#[tokio::test]
async fn save_and_load_roundtrip_strips_ephemeral_fields() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;

    let run = completed_run();
    let run_id = run.run_id;
    store.save(run).await.unwrap();

    let entries = store.load().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, run_id);
    // Live-progress fields never reach storage.
    assert!(entries[0].run.trials[0].active_prompts.is_empty());
    assert!(entries[0].run.trials[0].log_entries.is_empty());
}

#[tokio::test]
async fn export_import_roundtrip_reproduces_entries() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    for _ in 0..3 {
        store.save(completed_run()).await.unwrap();
        // Distinct save timestamps keep newest-first ordering deterministic.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let exported = store.export().await.unwrap();
    let mut original: Vec<Uuid> = store.load().await.unwrap().iter().map(|e| e.id).collect();

    let dir2 = TempDir::new().unwrap();
    let fresh = sqlite_store(&dir2, 500).await;
    let outcome = fresh.import(&exported).await.unwrap();
    assert_eq!(outcome.imported, 3);
    assert_eq!(outcome.skipped, 0);

    let mut imported: Vec<Uuid> = fresh.load().await.unwrap().iter().map(|e| e.id).collect();
    original.sort();
    imported.sort();
    assert_eq!(original, imported);

    // Payloads survive byte-for-byte at the JSON level.
    let a = serde_json::to_value(store.load().await.unwrap()).unwrap();
    let b = serde_json::to_value(fresh.load().await.unwrap()).unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn import_skips_entries_older_than_stored() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;

    let run = completed_run();
    let mut newer = HistoryEntry::from_run(run.clone());
    newer.saved_at = Utc::now();
    let mut older = newer.clone();
    older.saved_at = newer.saved_at - Duration::hours(1);

    let envelope = |entry: &HistoryEntry| {
        serde_json::json!({
            "schemaVersion": 1,
            "exportedAt": Utc::now(),
            "entries": [entry],
        })
        .to_string()
    };

    let outcome = store.import(&envelope(&newer)).await.unwrap();
    assert_eq!(outcome.imported, 1);

    let outcome = store.import(&envelope(&older)).await.unwrap();
    assert_eq!(outcome.imported, 0);
    assert_eq!(outcome.skipped, 1);

    let stored = store.get(newer.id).await.unwrap().unwrap();
    assert_eq!(stored.saved_at, newer.saved_at);
}

#[tokio::test]
async fn import_counts_invalid_entries_as_skipped() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;

    let valid = HistoryEntry::from_run(completed_run());
    let text = serde_json::json!({
        "schemaVersion": 1,
        "exportedAt": Utc::now(),
        "entries": [valid, serde_json::json!({ "garbage": true })],
    })
    .to_string();

    let outcome = store.import(&text).await.unwrap();
    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn import_rejects_unknown_schema_version() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    let text = r#"{"schemaVersion": 99, "exportedAt": "2026-01-01T00:00:00Z", "entries": []}"#;
    assert!(store.import(text).await.is_err());
}

#[tokio::test]
async fn entry_cap_evicts_exactly_the_oldest() {
    let dir = TempDir::new().unwrap();
    // Small cap keeps the test fast; the eviction logic is cap-agnostic.
    let store = sqlite_store(&dir, 5).await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        let entry = store.save(completed_run()).await.unwrap();
        ids.push(entry.id);
        // Distinct save timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let remaining: Vec<Uuid> = store.load().await.unwrap().iter().map(|e| e.id).collect();
    assert_eq!(remaining.len(), 5);
    assert!(!remaining.contains(&ids[0]), "oldest entry must be evicted");
    for id in &ids[1..] {
        assert!(remaining.contains(id));
    }
}

#[tokio::test]
async fn update_is_noop_for_absent_id() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    let touched = store
        .update(Uuid::new_v4(), |entry| {
            entry.run.best_trial_id = None;
        })
        .await
        .unwrap();
    assert!(!touched);
}

#[tokio::test]
async fn update_writes_back_weights() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    let saved = store.save(completed_run()).await.unwrap();

    let touched = store
        .update(saved.id, |entry| {
            entry.run.weights.set("avgTps", 2.0);
        })
        .await
        .unwrap();
    assert!(touched);
    let reread = store.get(saved.id).await.unwrap().unwrap();
    assert_eq!(reread.run.weights.get("avgTps"), 2.0);
}

#[tokio::test]
async fn delete_many_reports_deleted_count() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    let a = store.save(completed_run()).await.unwrap();
    let b = store.save(completed_run()).await.unwrap();

    let deleted = store.delete_many(&[a.id, Uuid::new_v4()]).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(store.get(a.id).await.unwrap().is_none());
    assert!(store.get(b.id).await.unwrap().is_some());
}

#[tokio::test]
async fn flat_file_history_migrates_into_sqlite_once() {
    let dir = TempDir::new().unwrap();
    let fallback_path = dir.path().join("fallback.json");

    // Seed legacy flat-file history.
    let legacy = FlatFileHistoryRepo::new(&fallback_path);
    let entry = HistoryEntry::from_run(completed_run());
    {
        use tunesmith::domain::ports::HistoryRepository;
        legacy.put(&entry).await.unwrap();
    }

    let url = db_url(&dir, "history.db");
    let store = open_history_store(&url, fallback_path.to_str().unwrap(), 500).await;
    let entries = store.load().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, entry.id);

    // The flat file is no longer the source of truth: reopening after the
    // marker is set must not re-import anything, even into a store whose
    // entries changed.
    store.delete(entry.id).await.unwrap();
    drop(store);
    let reopened = open_history_store(&url, fallback_path.to_str().unwrap(), 500).await;
    assert!(reopened.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn store_falls_back_to_flat_file_when_primary_unavailable() {
    let dir = TempDir::new().unwrap();
    let fallback_path = dir.path().join("fallback.json");
    // Unopenable database path: parent directory does not exist.
    let bad_url = format!(
        "sqlite:{}",
        dir.path().join("missing/deeply/history.db").display()
    );

    let store = open_history_store(&bad_url, fallback_path.to_str().unwrap(), 500).await;
    let saved = store.save(completed_run()).await.unwrap();
    assert_eq!(store.load().await.unwrap().len(), 1);
    assert!(store.get(saved.id).await.unwrap().is_some());
    assert!(fallback_path.exists());
}

#[tokio::test]
async fn mutations_emit_change_notifications() {
    let dir = TempDir::new().unwrap();
    let store = sqlite_store(&dir, 500).await;
    let mut events = store.subscribe();

    let saved = store.save(completed_run()).await.unwrap();
    store.delete(saved.id).await.unwrap();

    use tunesmith::HistoryEvent;
    assert!(matches!(events.try_recv(), Ok(HistoryEvent::Saved(id)) if id == saved.id));
    assert!(matches!(events.try_recv(), Ok(HistoryEvent::Deleted(_))));
}
