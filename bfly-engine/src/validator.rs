//! Observation Validator
//!
//! Single gate through which every new observation passes before it can touch
//! aggregates or the ledger. Rules run in a fixed order; the first failure wins.

use std::sync::Arc;

use bfly_common::SpeciesCatalog;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::observation::{Observation, ObservationDraft};

/// Permanent input errors; the caller must correct the submission
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationError {
    #[error("Unknown species: {species_id}")]
    UnknownSpecies { species_id: String },

    #[error("Confidence out of range [0,1]: {confidence}")]
    ConfidenceOutOfRange { confidence: f64 },

    #[error("Invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("Missing submitter")]
    MissingSubmitter,
}

impl ValidationError {
    /// Stable rule code reported to callers and in rejection events
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownSpecies { .. } => "UNKNOWN_SPECIES",
            ValidationError::ConfidenceOutOfRange { .. } => "CONFIDENCE_OUT_OF_RANGE",
            ValidationError::InvalidLocation { .. } => "INVALID_LOCATION",
            ValidationError::MissingSubmitter => "MISSING_SUBMITTER",
        }
    }
}

/// Validates drafts against the species catalog
#[derive(Debug, Clone)]
pub struct ObservationValidator {
    catalog: Arc<SpeciesCatalog>,
}

impl ObservationValidator {
    pub fn new(catalog: Arc<SpeciesCatalog>) -> Self {
        Self { catalog }
    }

    /// Validate a draft and assign it a fresh id
    pub fn validate(&self, draft: ObservationDraft) -> Result<Observation, ValidationError> {
        self.check(&draft)?;
        Ok(Observation::from_validated(Uuid::new_v4(), draft))
    }

    /// Run the rule chain without sealing the draft
    pub fn check(&self, draft: &ObservationDraft) -> Result<(), ValidationError> {
        if !self.catalog.contains(&draft.species_id) {
            return Err(ValidationError::UnknownSpecies {
                species_id: draft.species_id.clone(),
            });
        }

        // NaN fails the range check too
        if !(0.0..=1.0).contains(&draft.confidence) {
            return Err(ValidationError::ConfidenceOutOfRange {
                confidence: draft.confidence,
            });
        }

        if let Some(location) = draft.location {
            if !location.is_valid() {
                return Err(ValidationError::InvalidLocation {
                    latitude: location.latitude,
                    longitude: location.longitude,
                });
            }
        }

        if draft.submitted_by.trim().is_empty() {
            return Err(ValidationError::MissingSubmitter);
        }

        Ok(())
    }
}
