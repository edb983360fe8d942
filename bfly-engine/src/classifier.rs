//! Classifier Adapter
//!
//! Wraps any "species guess from an image reference" capability behind the
//! [`SpeciesClassifier`] trait and bounds every call with a deadline and a
//! caller-owned cancellation token. The adapter never checks confidence bounds;
//! that belongs to the validator.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bfly_common::config::{ClassifierSettings, LookupEntry};
use bfly_common::SpeciesCatalog;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backend output before validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawClassification {
    pub species_id: String,
    pub confidence: f64,
    /// Backend-specific extras (model version, source, ...)
    pub metadata: BTreeMap<String, String>,
}

impl RawClassification {
    pub fn new(species_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            species_id: species_id.into(),
            confidence,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Transient classification failure (`ClassificationUnavailable`)
///
/// Retryable by the caller; never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassificationError {
    /// Backend could not produce a result (unsupported image, model error)
    #[error("Classification unavailable: {0}")]
    Backend(String),

    #[error("Classification unavailable: timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Classification unavailable: cancelled")]
    Cancelled,
}

impl ClassificationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationError::Backend(_) => "backend",
            ClassificationError::TimedOut(_) => "timed_out",
            ClassificationError::Cancelled => "cancelled",
        }
    }
}

/// Capability: produce a species guess from an image reference
///
/// Implementations may call a model, consult a table, or wait on a human
/// reviewer. They must be safe to call concurrently.
#[async_trait]
pub trait SpeciesClassifier: Send + Sync {
    /// Backend name for provenance metadata and logs
    fn name(&self) -> &'static str;

    async fn classify(&self, image_ref: &str) -> Result<RawClassification, ClassificationError>;
}

/// Deadline- and cancellation-bound front for a classifier backend
#[derive(Clone)]
pub struct ClassifierAdapter {
    backend: Arc<dyn SpeciesClassifier>,
    timeout: Duration,
}

impl ClassifierAdapter {
    pub fn new(backend: Arc<dyn SpeciesClassifier>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Classify one image, giving up at the deadline or on cancellation
    pub async fn classify(
        &self,
        image_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<RawClassification, ClassificationError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClassificationError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.backend.classify(image_ref)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ClassificationError::TimedOut(self.timeout)),
                }
            }
        };

        match &result {
            Ok(raw) => debug!(
                backend = self.backend.name(),
                image_ref,
                species_id = %raw.species_id,
                confidence = raw.confidence,
                "Classified image"
            ),
            Err(e) => debug!(backend = self.backend.name(), image_ref, "Classification failed: {}", e),
        }
        result
    }
}

/// Picks a random catalog species with a uniformly drawn confidence
///
/// Stand-in for a recognition model; a fixed seed makes runs reproducible.
pub struct CatalogSampler {
    species_ids: Vec<String>,
    min_confidence: f64,
    max_confidence: f64,
    rng: Mutex<StdRng>,
}

impl CatalogSampler {
    /// Fails with `Error::Config` when either bound is NaN or infinite
    pub fn new(
        catalog: &SpeciesCatalog,
        min_confidence: f64,
        max_confidence: f64,
        seed: Option<u64>,
    ) -> bfly_common::Result<Self> {
        if !min_confidence.is_finite() || !max_confidence.is_finite() {
            return Err(bfly_common::Error::Config(format!(
                "sampler confidence range must be finite, got {}..={}",
                min_confidence, max_confidence
            )));
        }
        let (lo, hi) = if min_confidence <= max_confidence {
            (min_confidence, max_confidence)
        } else {
            (max_confidence, min_confidence)
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            species_ids: catalog.entries().iter().map(|e| e.species_id.clone()).collect(),
            min_confidence: lo,
            max_confidence: hi,
            rng: Mutex::new(rng),
        })
    }
}

#[async_trait]
impl SpeciesClassifier for CatalogSampler {
    fn name(&self) -> &'static str {
        "catalog_sampler"
    }

    async fn classify(&self, image_ref: &str) -> Result<RawClassification, ClassificationError> {
        if image_ref.trim().is_empty() {
            return Err(ClassificationError::Backend("empty image reference".to_string()));
        }
        if self.species_ids.is_empty() {
            return Err(ClassificationError::Backend("catalog is empty".to_string()));
        }

        let (species_id, confidence) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| ClassificationError::Backend("sampler state poisoned".to_string()))?;
            let index = rng.gen_range(0..self.species_ids.len());
            let confidence = if self.min_confidence < self.max_confidence {
                rng.gen_range(self.min_confidence..=self.max_confidence)
            } else {
                self.min_confidence
            };
            (self.species_ids[index].clone(), confidence)
        };

        Ok(RawClassification::new(species_id, confidence).with_metadata("backend", self.name()))
    }
}

/// Fixed image_ref → classification table
///
/// Used for expert overrides and reproducible ingestion runs. Unknown image
/// references are reported as unavailable.
#[derive(Debug, Default)]
pub struct LookupClassifier {
    table: HashMap<String, RawClassification>,
}

impl LookupClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[LookupEntry]) -> Self {
        let mut classifier = Self::new();
        for entry in entries {
            classifier.insert(&entry.image_ref, &entry.species_id, entry.confidence);
        }
        classifier
    }

    pub fn insert(&mut self, image_ref: &str, species_id: &str, confidence: f64) {
        self.table.insert(
            image_ref.to_string(),
            RawClassification::new(species_id, confidence).with_metadata("backend", "lookup"),
        );
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[async_trait]
impl SpeciesClassifier for LookupClassifier {
    fn name(&self) -> &'static str {
        "lookup"
    }

    async fn classify(&self, image_ref: &str) -> Result<RawClassification, ClassificationError> {
        self.table
            .get(image_ref)
            .cloned()
            .ok_or_else(|| ClassificationError::Backend(format!("no entry for image '{}'", image_ref)))
    }
}

/// Build the configured backend
pub fn build_classifier(
    settings: &ClassifierSettings,
    catalog: &SpeciesCatalog,
) -> bfly_common::Result<Arc<dyn SpeciesClassifier>> {
    let backend: Arc<dyn SpeciesClassifier> = match settings {
        ClassifierSettings::Sampler {
            min_confidence,
            max_confidence,
            seed,
        } => Arc::new(CatalogSampler::new(catalog, *min_confidence, *max_confidence, *seed)?),
        ClassifierSettings::Lookup { entries } => Arc::new(LookupClassifier::from_entries(entries)),
    };
    Ok(backend)
}
