//! Conservation Policy
//!
//! Pure lookup from an observation's species to its conservation status.
//! A geolocated sighting of a threatened species raises an alert.

use std::sync::Arc;

use bfly_common::{ConservationStatus, SpeciesCatalog};
use serde::Serialize;

use crate::observation::Observation;

/// Status information attached to an accepted observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConservationAnnotation {
    pub status: ConservationStatus,
    pub status_label: String,
    pub notes: String,
    pub alert: bool,
}

#[derive(Debug, Clone)]
pub struct ConservationPolicy {
    catalog: Arc<SpeciesCatalog>,
}

impl ConservationPolicy {
    pub fn new(catalog: Arc<SpeciesCatalog>) -> Self {
        Self { catalog }
    }

    /// Annotate a validated observation
    ///
    /// Validated observations always reference a catalog species, so the
    /// lookup only misses for records journaled against a different catalog.
    /// Those are treated as unassessed (LeastConcern, no alert).
    pub fn annotate(&self, observation: &Observation) -> ConservationAnnotation {
        match self.catalog.get(observation.species_id()) {
            Some(entry) => ConservationAnnotation {
                status: entry.conservation_status,
                status_label: entry.conservation_status.as_str().to_string(),
                notes: entry.conservation_notes.clone(),
                alert: entry.conservation_status.is_threatened()
                    && observation.location().is_some(),
            },
            None => ConservationAnnotation {
                status: ConservationStatus::LeastConcern,
                status_label: ConservationStatus::LeastConcern.as_str().to_string(),
                notes: String::new(),
                alert: false,
            },
        }
    }
}
