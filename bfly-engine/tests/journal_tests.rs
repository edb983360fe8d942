//! Integration tests for the SQLite observation journal and replay

use std::sync::Arc;

use bfly_common::config::EngineSettings;
use bfly_common::db::init_database;
use bfly_common::events::EventBus;
use bfly_common::{GeoPoint, SpeciesCatalog};
use bfly_engine::classifier::LookupClassifier;
use bfly_engine::db::SqliteJournal;
use bfly_engine::journal::ObservationJournal;
use bfly_engine::{ObservationEngine, SubmitRequest};
use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn lookup() -> LookupClassifier {
    let mut lookup = LookupClassifier::new();
    lookup.insert("monarch.jpg", "monarch", 0.93);
    lookup.insert("lady.jpg", "painted_lady", 0.81);
    lookup.insert("admiral.jpg", "red_admiral", 0.77);
    lookup
}

async fn journal_in(dir: &TempDir) -> Arc<SqliteJournal> {
    let pool = init_database(&dir.path().join("bfly.db")).await.unwrap();
    Arc::new(SqliteJournal::new(pool))
}

fn engine_with(journal: Arc<SqliteJournal>, events: EventBus) -> ObservationEngine {
    ObservationEngine::new(
        Arc::new(SpeciesCatalog::builtin()),
        Arc::new(lookup()),
        &EngineSettings::default(),
        events,
    )
    .with_journal(journal)
}

#[tokio::test]
async fn test_append_and_load_preserve_order_and_fields() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir).await;
    let engine = engine_with(Arc::clone(&journal), EventBus::new(16));

    let observed = Utc.with_ymd_and_hms(2025, 7, 4, 15, 30, 0).unwrap();
    let first = engine
        .submit_observation(
            SubmitRequest::new("monarch.jpg", "alex")
                .with_location(GeoPoint::new(44.97, -93.26))
                .with_label("Meadow Creek")
                .observed_at(observed),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let second = engine
        .submit_observation(SubmitRequest::new("lady.jpg", "sam"), &CancellationToken::new())
        .await
        .unwrap();

    let loaded = journal.load_all().await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], first.observation);
    assert_eq!(loaded[1], second.observation);
    assert_eq!(loaded[0].observed_at(), observed);
    assert_eq!(loaded[0].location_label(), Some("Meadow Creek"));
    assert_eq!(journal.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_same_observation_cannot_be_journaled_twice() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir).await;
    let engine = engine_with(Arc::clone(&journal), EventBus::new(16));

    let receipt = engine
        .submit_observation(SubmitRequest::new("monarch.jpg", "alex"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(journal.append(&receipt.observation).await.is_err());
    assert_eq!(journal.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_replay_reproduces_summary_and_ledger() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir).await;
    let original = engine_with(Arc::clone(&journal), EventBus::new(256));

    let may = Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap();
    let june = Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap();
    let submissions = vec![
        SubmitRequest::new("monarch.jpg", "alex").with_label("Pine Forest Trail").observed_at(may),
        SubmitRequest::new("monarch.jpg", "alex")
            .with_label("Pine Forest Trail")
            .with_location(GeoPoint::new(40.1, -75.3))
            .observed_at(june),
        SubmitRequest::new("lady.jpg", "alex").observed_at(june),
        SubmitRequest::new("admiral.jpg", "alex").with_label("Oak Hill Reserve").observed_at(june),
        SubmitRequest::new("lady.jpg", "sam").with_label("Oak Hill Reserve").observed_at(may),
    ];
    for request in submissions {
        original
            .submit_observation(request, &CancellationToken::new())
            .await
            .unwrap();
    }

    let events = EventBus::new(16);
    let mut rx = events.subscribe();
    let restored = engine_with(Arc::clone(&journal), events);
    let stats = restored.replay().await.unwrap();
    assert_eq!(stats.loaded, 5);
    assert_eq!(stats.applied, 5);
    assert_eq!(stats.duplicates, 0);

    assert_eq!(restored.summary().await, original.summary().await);
    assert_eq!(restored.leaderboard(10).await, original.leaderboard(10).await);
    assert_eq!(
        restored.user_progress("alex").await,
        original.user_progress("alex").await
    );
    assert_eq!(
        restored.hotspot_detail("Oak Hill Reserve").await,
        original.hotspot_detail("Oak Hill Reserve").await
    );

    // Replay neither re-appends nor announces
    assert_eq!(journal.count().await.unwrap(), 5);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_replay_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir).await;
    let original = engine_with(Arc::clone(&journal), EventBus::new(16));
    original
        .submit_observation(SubmitRequest::new("monarch.jpg", "alex"), &CancellationToken::new())
        .await
        .unwrap();

    let restored = engine_with(Arc::clone(&journal), EventBus::new(16));
    restored.replay().await.unwrap();
    let again = restored.replay().await.unwrap();
    assert_eq!(again.applied, 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(restored.summary().await.total_observations, 1);
    assert_eq!(restored.user_progress("alex").await.unwrap().points, 10);
}

#[tokio::test]
async fn test_replay_without_journal_is_empty() {
    let engine = ObservationEngine::new(
        Arc::new(SpeciesCatalog::builtin()),
        Arc::new(lookup()),
        &EngineSettings::default(),
        EventBus::new(16),
    );
    let stats = engine.replay().await.unwrap();
    assert_eq!(stats.loaded, 0);
}

#[tokio::test]
async fn test_replay_handles_years_outside_four_digits() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir).await;
    let original = engine_with(Arc::clone(&journal), EventBus::new(16));

    let far_future = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
    let far_past = Utc.with_ymd_and_hms(-500, 6, 1, 12, 0, 0).unwrap();
    for at in [far_future, far_past] {
        original
            .submit_observation(
                SubmitRequest::new("monarch.jpg", "alex").observed_at(at),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    let loaded = journal.load_all().await.unwrap();
    assert_eq!(loaded[0].observed_at(), far_future);
    assert_eq!(loaded[1].observed_at(), far_past);

    let restored = engine_with(Arc::clone(&journal), EventBus::new(16));
    let stats = restored.replay().await.unwrap();
    assert_eq!(stats.applied, 2);
    assert_eq!(restored.summary().await, original.summary().await);
}
