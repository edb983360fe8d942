//! Observation records
//!
//! `ObservationDraft` is what the classifier adapter and the submitting caller
//! produce together. `Observation` is the validated, immutable record; it can
//! only be built inside this crate (by the validator, or by the journal when
//! replaying records that were validated before they were written).

use bfly_common::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Observation identifier (assigned at validation time)
pub type ObservationId = Uuid;

/// Unvalidated observation assembled from a classification and caller input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDraft {
    pub image_ref: String,
    pub species_id: String,
    pub confidence: f64,
    pub location: Option<GeoPoint>,
    pub location_label: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub submitted_by: String,
}

/// Validated species observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    id: ObservationId,
    image_ref: String,
    species_id: String,
    confidence: f64,
    location: Option<GeoPoint>,
    location_label: Option<String>,
    observed_at: DateTime<Utc>,
    submitted_by: String,
}

impl Observation {
    /// Seal a draft that has passed validation
    pub(crate) fn from_validated(id: ObservationId, draft: ObservationDraft) -> Self {
        Self {
            id,
            image_ref: draft.image_ref,
            species_id: draft.species_id,
            confidence: draft.confidence,
            location: draft.location,
            location_label: draft.location_label,
            observed_at: draft.observed_at,
            submitted_by: draft.submitted_by,
        }
    }

    pub fn id(&self) -> ObservationId {
        self.id
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn species_id(&self) -> &str {
        &self.species_id
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn location_label(&self) -> Option<&str> {
        self.location_label.as_deref()
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn submitted_by(&self) -> &str {
        &self.submitted_by
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_confidence(self.confidence)
    }
}

/// Display tier for a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceBand {
    /// confidence >= 0.9
    High,
    /// 0.7 <= confidence < 0.9
    Medium,
    /// confidence < 0.7
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceBand::High
        } else if confidence >= 0.7 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}
