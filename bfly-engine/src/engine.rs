//! Observation engine
//!
//! Orchestrates one submission end to end:
//! classify → validate → annotate → journal → commit → announce.
//!
//! All aggregate and ledger state lives in a single [`EngineState`] behind one
//! `RwLock`. A commit (fold + ledger record) holds the write guard; queries
//! hold the read guard only while they copy out the view they return.

use std::sync::Arc;

use bfly_common::config::EngineSettings;
use bfly_common::events::{BflyEvent, EventBus};
use bfly_common::{GeoPoint, PeriodKey, SpeciesCatalog, SpeciesEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregation::{
    AnnotatedObservation, FoldOutcome, HotspotBreakdown, HotspotSummary, SeriesPoint, SpeciesCount,
};
use crate::classifier::{ClassificationError, ClassifierAdapter, SpeciesClassifier};
use crate::conservation::{ConservationAnnotation, ConservationPolicy};
use crate::journal::ObservationJournal;
use crate::ledger::{Achievement, LeaderboardEntry, LedgerUpdate, UserProgress};
use crate::observation::{ConfidenceBand, Observation, ObservationDraft};
use crate::query::{EngineState, QueryFacade, SpeciesTrend, Summary};
use crate::validator::{ObservationValidator, ValidationError};

/// Caller input for one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub image_ref: String,
    pub submitted_by: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub location_label: Option<String>,
    /// Defaults to submission time
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl SubmitRequest {
    pub fn new(image_ref: impl Into<String>, submitted_by: impl Into<String>) -> Self {
        Self {
            image_ref: image_ref.into(),
            submitted_by: submitted_by.into(),
            location: None,
            location_label: None,
            observed_at: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.location_label = Some(label.into());
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// Everything the caller needs to render an accepted identification
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub observation: Observation,
    pub confidence_band: ConfidenceBand,
    pub species: SpeciesEntry,
    pub annotation: ConservationAnnotation,
    pub points_awarded: u64,
    pub newly_unlocked: Vec<Achievement>,
    pub share_text: String,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Transient; the caller may retry
    #[error(transparent)]
    ClassificationUnavailable(#[from] ClassificationError),

    /// Permanent; the submission must be corrected
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Journal write failed: {0}")]
    Journal(bfly_common::Error),

    /// The commit task panicked or was aborted
    #[error("Commit failed: {0}")]
    Internal(String),
}

/// Result of rebuilding state from the journal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub loaded: usize,
    pub applied: usize,
    pub duplicates: usize,
}

/// Share message for an identified species
pub fn share_text(common_name: &str) -> String {
    format!(
        "I just identified a {} using ButterflyAI! 🦋 #ButterflyIdentification #CitizenScience",
        common_name
    )
}

fn normalize_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

/// Fold and record under one write guard
async fn commit(state: &RwLock<EngineState>, record: &AnnotatedObservation) -> LedgerUpdate {
    let mut state = state.write().await;
    match state.aggregates.fold(record) {
        FoldOutcome::Applied => {
            let user = record.observation.submitted_by().to_string();
            state.ledger.record(&user, &record.observation)
        }
        FoldOutcome::Duplicate => {
            warn!(
                observation_id = %record.observation.id(),
                "Duplicate observation ignored"
            );
            LedgerUpdate::default()
        }
    }
}

/// Publish the events for one committed observation
fn announce(event_bus: &EventBus, record: &AnnotatedObservation, update: &LedgerUpdate) {
    let observation = &record.observation;
    let timestamp = Utc::now();

    event_bus.emit_lossy(BflyEvent::ObservationAccepted {
        observation_id: observation.id(),
        species_id: observation.species_id().to_string(),
        submitted_by: observation.submitted_by().to_string(),
        confidence: observation.confidence(),
        location_label: observation.location_label().map(str::to_string),
        points_awarded: update.points_awarded,
        timestamp,
    });

    for achievement in &update.newly_unlocked {
        info!(
            user_id = %observation.submitted_by(),
            achievement = achievement.id,
            "Achievement unlocked"
        );
        event_bus.emit_lossy(BflyEvent::AchievementUnlocked {
            user_id: observation.submitted_by().to_string(),
            achievement_id: achievement.id.to_string(),
            timestamp,
        });
    }

    if let Some(location) = observation.location().filter(|_| record.annotation.alert) {
        warn!(
            observation_id = %observation.id(),
            species_id = %observation.species_id(),
            status = record.annotation.status.as_str(),
            "Conservation alert"
        );
        event_bus.emit_lossy(BflyEvent::ConservationAlert {
            observation_id: observation.id(),
            species_id: observation.species_id().to_string(),
            status: record.annotation.status,
            location,
            timestamp,
        });
    }
}

pub struct ObservationEngine {
    catalog: Arc<SpeciesCatalog>,
    classifier: ClassifierAdapter,
    validator: ObservationValidator,
    policy: ConservationPolicy,
    queries: QueryFacade,
    state: Arc<RwLock<EngineState>>,
    /// Serializes journal append + commit so journal order matches fold order
    commit_order: Arc<Mutex<()>>,
    journal: Option<Arc<dyn ObservationJournal>>,
    event_bus: EventBus,
    batch_concurrency: usize,
}

impl ObservationEngine {
    pub fn new(
        catalog: Arc<SpeciesCatalog>,
        backend: Arc<dyn SpeciesClassifier>,
        settings: &EngineSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            classifier: ClassifierAdapter::new(backend, settings.classify_timeout()),
            validator: ObservationValidator::new(Arc::clone(&catalog)),
            policy: ConservationPolicy::new(Arc::clone(&catalog)),
            queries: QueryFacade::new(Arc::clone(&catalog)),
            state: Arc::new(RwLock::new(EngineState::new(
                settings.base_points,
                settings.recent_capacity,
            ))),
            commit_order: Arc::new(Mutex::new(())),
            journal: None,
            event_bus,
            batch_concurrency: settings.batch_concurrency.max(1),
            catalog,
        }
    }

    /// Journal every accepted observation before it is committed
    pub fn with_journal(mut self, journal: Arc<dyn ObservationJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn catalog(&self) -> &Arc<SpeciesCatalog> {
        &self.catalog
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.backend_name()
    }

    // ========================================
    // Submission
    // ========================================

    /// Classify, validate and commit one image submission
    ///
    /// Nothing is touched when classification fails, times out, or is
    /// cancelled, or when the draft is rejected. Once journaling starts the
    /// submission runs to completion on its own task, even if this future is
    /// dropped.
    pub async fn submit_observation(
        &self,
        request: SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let raw = match self.classifier.classify(&request.image_ref, cancel).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    image_ref = %request.image_ref,
                    submitted_by = %request.submitted_by,
                    kind = e.kind(),
                    "Submission not classified: {}", e
                );
                return Err(e.into());
            }
        };

        let draft = ObservationDraft {
            image_ref: request.image_ref,
            species_id: raw.species_id,
            confidence: raw.confidence,
            location: request.location,
            location_label: normalize_label(request.location_label),
            observed_at: request.observed_at.unwrap_or_else(bfly_common::time::now),
            submitted_by: request.submitted_by,
        };

        let observation = match self.validator.validate(draft.clone()) {
            Ok(observation) => observation,
            Err(e) => {
                info!(
                    submitted_by = %draft.submitted_by,
                    code = e.code(),
                    "Observation rejected: {}", e
                );
                self.event_bus.emit_lossy(BflyEvent::ObservationRejected {
                    submitted_by: draft.submitted_by,
                    reason: e.code().to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        let species = self
            .catalog
            .get(observation.species_id())
            .cloned()
            .ok_or_else(|| ValidationError::UnknownSpecies {
                species_id: observation.species_id().to_string(),
            })?;

        let record = AnnotatedObservation {
            annotation: self.policy.annotate(&observation),
            observation,
        };

        let state = Arc::clone(&self.state);
        let commit_order = Arc::clone(&self.commit_order);
        let journal = self.journal.clone();
        let event_bus = self.event_bus.clone();
        let committed = tokio::spawn(async move {
            let _order = commit_order.lock().await;
            if let Some(journal) = &journal {
                if let Err(e) = journal.append(&record.observation).await {
                    error!(
                        observation_id = %record.observation.id(),
                        "Failed to journal observation: {}", e
                    );
                    return Err(SubmitError::Journal(e));
                }
            }
            let update = commit(&state, &record).await;

            info!(
                observation_id = %record.observation.id(),
                species_id = %record.observation.species_id(),
                submitted_by = %record.observation.submitted_by(),
                confidence = record.observation.confidence(),
                points = update.points_awarded,
                "Observation accepted"
            );
            announce(&event_bus, &record, &update);
            Ok((record, update))
        });

        let (record, update) = match committed.await {
            Ok(result) => result?,
            Err(e) => {
                error!("Commit task failed: {}", e);
                return Err(SubmitError::Internal(e.to_string()));
            }
        };

        Ok(SubmissionReceipt {
            confidence_band: record.observation.confidence_band(),
            share_text: share_text(&species.common_name),
            observation: record.observation,
            species,
            annotation: record.annotation,
            points_awarded: update.points_awarded,
            newly_unlocked: update.newly_unlocked,
        })
    }

    /// Submit many images concurrently (camera-trap ingestion)
    ///
    /// At most `batch_concurrency` submissions are in flight; results are
    /// returned in input order.
    pub async fn submit_batch(
        self: &Arc<Self>,
        requests: Vec<SubmitRequest>,
        cancel: &CancellationToken,
    ) -> Vec<Result<SubmissionReceipt, SubmitError>> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));
        let mut tasks = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => engine.submit_observation(request, &cancel).await,
                    Err(_) => Err(ClassificationError::Cancelled.into()),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<SubmissionReceipt, SubmitError>>> =
            (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("Batch submission task failed: {}", e),
            }
        }

        let results: Vec<_> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ClassificationError::Backend("submission task aborted".to_string()).into())
                })
            })
            .collect();

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        info!("Batch complete: {}/{} accepted", accepted, total);
        results
    }

    // ========================================
    // Replay
    // ========================================

    /// Commit an already-validated observation without journaling or events
    pub async fn apply(&self, observation: Observation) -> FoldOutcome {
        let record = AnnotatedObservation {
            annotation: self.policy.annotate(&observation),
            observation,
        };
        let mut state = self.state.write().await;
        let outcome = state.aggregates.fold(&record);
        if outcome == FoldOutcome::Applied {
            let user = record.observation.submitted_by().to_string();
            state.ledger.record(&user, &record.observation);
        }
        outcome
    }

    /// Rebuild aggregates and ledger from the configured journal
    pub async fn replay(&self) -> bfly_common::Result<ReplayStats> {
        let Some(journal) = &self.journal else {
            return Ok(ReplayStats::default());
        };

        let observations = journal.load_all().await?;
        let mut stats = ReplayStats {
            loaded: observations.len(),
            ..ReplayStats::default()
        };

        for observation in observations {
            if !self.catalog.contains(observation.species_id()) {
                debug!(
                    observation_id = %observation.id(),
                    species_id = %observation.species_id(),
                    "Replaying observation for species outside the catalog"
                );
            }
            match self.apply(observation).await {
                FoldOutcome::Applied => stats.applied += 1,
                FoldOutcome::Duplicate => stats.duplicates += 1,
            }
        }

        if stats.duplicates > 0 {
            warn!("Journal replay skipped {} duplicate observations", stats.duplicates);
        }
        info!(
            "Journal replay complete: {} loaded, {} applied",
            stats.loaded, stats.applied
        );
        Ok(stats)
    }

    // ========================================
    // Queries
    // ========================================

    /// Run a read-only closure against one consistent view of the state
    pub async fn with_state<R>(&self, f: impl FnOnce(&QueryFacade, &EngineState) -> R) -> R {
        let state = self.state.read().await;
        f(&self.queries, &state)
    }

    pub async fn summary(&self) -> Summary {
        self.with_state(|q, s| q.summary(s)).await
    }

    pub async fn leaderboard(&self, n: usize) -> Vec<LeaderboardEntry> {
        self.with_state(|q, s| q.leaderboard(s, n)).await
    }

    pub async fn species_trend(&self, species_id: &str) -> Option<SpeciesTrend> {
        self.with_state(|q, s| q.species_trend(s, species_id)).await
    }

    pub async fn hotspot_detail(&self, label: &str) -> Option<HotspotBreakdown> {
        self.with_state(|q, s| q.hotspot_detail(s, label)).await
    }

    pub async fn recent_observations(&self, n: usize) -> Vec<AnnotatedObservation> {
        self.with_state(|q, s| q.recent_observations(s, n)).await
    }

    pub async fn top_species(&self, n: usize) -> Vec<SpeciesCount> {
        self.with_state(|q, s| q.top_species(s, n)).await
    }

    pub async fn hotspots(&self, n: usize) -> Vec<HotspotSummary> {
        self.with_state(|q, s| q.hotspots(s, n)).await
    }

    pub async fn series(&self, from: Option<PeriodKey>, to: Option<PeriodKey>) -> Vec<SeriesPoint> {
        self.with_state(|q, s| q.series(s, from, to)).await
    }

    pub async fn user_progress(&self, user_id: &str) -> Option<UserProgress> {
        self.with_state(|q, s| q.user_progress(s, user_id)).await
    }
}
