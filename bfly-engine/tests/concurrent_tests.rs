//! Integration tests for concurrent submissions
//!
//! Commits are atomic with respect to aggregate and ledger state, and
//! queries never observe a half-applied commit.

use std::sync::Arc;

use bfly_common::config::EngineSettings;
use bfly_common::events::EventBus;
use bfly_common::SpeciesCatalog;
use bfly_engine::classifier::{CatalogSampler, LookupClassifier};
use bfly_engine::{ObservationEngine, SubmitError, SubmitRequest};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

fn lookup_engine() -> Arc<ObservationEngine> {
    let mut lookup = LookupClassifier::new();
    lookup.insert("monarch.jpg", "monarch", 0.93);
    lookup.insert("lady.jpg", "painted_lady", 0.81);
    lookup.insert("moth.jpg", "luna_moth", 0.88);
    Arc::new(ObservationEngine::new(
        Arc::new(SpeciesCatalog::builtin()),
        Arc::new(lookup),
        &EngineSettings::default(),
        EventBus::new(1024),
    ))
}

#[tokio::test]
async fn test_two_concurrent_submissions_same_user() {
    let engine = lookup_engine();
    let mut join_set = JoinSet::new();
    for _ in 0..2 {
        let engine = Arc::clone(&engine);
        join_set.spawn(async move {
            engine
                .submit_observation(SubmitRequest::new("monarch.jpg", "alex"), &CancellationToken::new())
                .await
        });
    }
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
    }

    let progress = engine.user_progress("alex").await.unwrap();
    assert_eq!(progress.points, 2 * 10);
    assert_eq!(progress.observations, 2);
    // Only one of the two commits unlocked the first achievement
    assert_eq!(progress.unlocked.len(), 1);
}

#[tokio::test]
async fn test_many_concurrent_submissions_across_users() {
    let catalog = Arc::new(SpeciesCatalog::builtin());
    let engine = Arc::new(ObservationEngine::new(
        Arc::clone(&catalog),
        Arc::new(CatalogSampler::new(&catalog, 0.75, 0.95, Some(11)).unwrap()),
        &EngineSettings::default(),
        EventBus::new(1024),
    ));

    let mut join_set = JoinSet::new();
    for i in 0..60 {
        let engine = Arc::clone(&engine);
        join_set.spawn(async move {
            let request = SubmitRequest::new(format!("trap/{:04}.jpg", i), format!("user-{}", i % 6))
                .with_label(format!("Site {}", i % 4));
            engine.submit_observation(request, &CancellationToken::new()).await
        });
    }

    let mut accepted = 0;
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
        accepted += 1;
    }
    assert_eq!(accepted, 60);

    let summary = engine.summary().await;
    assert_eq!(summary.total_observations, 60);
    assert_eq!(summary.active_contributors, 6);

    let board = engine.leaderboard(10).await;
    let total_points: u64 = board.iter().map(|e| e.points).sum();
    assert_eq!(total_points, 600);
    assert!(board.iter().all(|e| e.points == 100));

    let species_total: u64 = engine.top_species(10).await.iter().map(|s| s.count).sum();
    assert_eq!(species_total, 60);
}

#[tokio::test]
async fn test_reads_see_consistent_state_during_writes() {
    let engine = lookup_engine();
    let mut writers = JoinSet::new();
    for i in 0..40 {
        let engine = Arc::clone(&engine);
        writers.spawn(async move {
            let mut request = SubmitRequest::new("lady.jpg", format!("user-{}", i % 5));
            if i % 2 == 0 {
                request = request.with_label("Meadow Creek");
            }
            engine.submit_observation(request, &CancellationToken::new()).await
        });
    }

    let reader_engine = Arc::clone(&engine);
    let reader = tokio::spawn(async move {
        for _ in 0..200 {
            reader_engine
                .with_state(|_, state| {
                    let aggregates = &state.aggregates;
                    assert_eq!(
                        aggregates.labeled_total() + aggregates.unlabeled_observations(),
                        aggregates.total_observations()
                    );
                    let ledger_points: u64 = state
                        .ledger
                        .leaderboard(usize::MAX)
                        .iter()
                        .map(|e| e.points)
                        .sum();
                    assert_eq!(ledger_points, aggregates.total_observations() * 10);
                })
                .await;
            tokio::task::yield_now().await;
        }
    });

    while let Some(result) = writers.join_next().await {
        result.unwrap().unwrap();
    }
    reader.await.unwrap();
    assert_eq!(engine.summary().await.total_observations, 40);
}

#[tokio::test]
async fn test_batch_results_in_input_order() {
    let engine = lookup_engine();
    let requests = vec![
        SubmitRequest::new("monarch.jpg", "trap-1"),
        SubmitRequest::new("moth.jpg", "trap-1"),
        SubmitRequest::new("lady.jpg", "trap-1"),
        SubmitRequest::new("missing.jpg", "trap-1"),
        SubmitRequest::new("monarch.jpg", "trap-1"),
    ];

    let results = engine.submit_batch(requests, &CancellationToken::new()).await;
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].as_ref().unwrap().observation.species_id(), "monarch");
    assert!(matches!(results[1], Err(SubmitError::Validation(_))));
    assert_eq!(results[2].as_ref().unwrap().observation.species_id(), "painted_lady");
    assert!(matches!(results[3], Err(SubmitError::ClassificationUnavailable(_))));
    assert!(results[4].is_ok());

    assert_eq!(engine.summary().await.total_observations, 3);
    assert_eq!(engine.user_progress("trap-1").await.unwrap().points, 30);
}

#[tokio::test]
async fn test_batch_respects_concurrency_limit_of_one() {
    let mut lookup = LookupClassifier::new();
    lookup.insert("monarch.jpg", "monarch", 0.93);
    let engine = Arc::new(ObservationEngine::new(
        Arc::new(SpeciesCatalog::builtin()),
        Arc::new(lookup),
        &EngineSettings {
            batch_concurrency: 1,
            ..EngineSettings::default()
        },
        EventBus::new(64),
    ));

    let requests = (0..10).map(|_| SubmitRequest::new("monarch.jpg", "solo")).collect();
    let results = engine.submit_batch(requests, &CancellationToken::new()).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(engine.user_progress("solo").await.unwrap().points, 100);
}
