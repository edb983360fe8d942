//! Query Facade
//!
//! Read models assembled from one consistent view of the engine state.
//! Every function here takes `&EngineState` and returns owned data, so the
//! caller's read guard can be dropped as soon as the view is built.

use std::sync::Arc;

use bfly_common::{ConservationStatus, PeriodKey, SpeciesCatalog};
use serde::Serialize;

use crate::aggregation::{
    AggregationStore, AnnotatedObservation, HotspotBreakdown, HotspotSummary, SeriesPoint,
    SpeciesCount,
};
use crate::ledger::{LeaderboardEntry, ProgressLedger, UserProgress};

/// Rows in the summary's top species panel
pub const SUMMARY_TOP_SPECIES: usize = 5;
/// Rows in the summary's hotspot panel
pub const SUMMARY_TOP_HOTSPOTS: usize = 3;

/// Aggregates and ledger, committed together
#[derive(Debug)]
pub struct EngineState {
    pub aggregates: AggregationStore,
    pub ledger: ProgressLedger,
}

impl EngineState {
    pub fn new(base_points: u64, recent_capacity: usize) -> Self {
        Self {
            aggregates: AggregationStore::new(recent_capacity),
            ledger: ProgressLedger::new(base_points),
        }
    }
}

/// Research dashboard summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_observations: u64,
    pub species_observed: usize,
    pub catalog_size: usize,
    pub hotspot_count: usize,
    pub active_contributors: usize,
    pub conservation_alerts: u64,
    pub peak_period: Option<SeriesPoint>,
    pub overall_trend: f64,
    pub top_species: Vec<SpeciesCount>,
    pub top_hotspots: Vec<HotspotSummary>,
}

/// Species history enriched with catalog data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesTrend {
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub conservation_status: ConservationStatus,
    pub count: u64,
    pub trend: f64,
    pub series: Vec<SeriesPoint>,
}

/// Read-only facade bound to the catalog
#[derive(Debug, Clone)]
pub struct QueryFacade {
    catalog: Arc<SpeciesCatalog>,
}

impl QueryFacade {
    pub fn new(catalog: Arc<SpeciesCatalog>) -> Self {
        Self { catalog }
    }

    pub fn summary(&self, state: &EngineState) -> Summary {
        let aggregates = &state.aggregates;
        Summary {
            total_observations: aggregates.total_observations(),
            species_observed: aggregates.species_observed(),
            catalog_size: self.catalog.len(),
            hotspot_count: aggregates.hotspot_count(),
            active_contributors: state.ledger.contributors(),
            conservation_alerts: aggregates.conservation_alerts(),
            peak_period: aggregates.peak_period(),
            overall_trend: aggregates.overall_trend(),
            top_species: aggregates.top_species(SUMMARY_TOP_SPECIES),
            top_hotspots: aggregates.hotspots(SUMMARY_TOP_HOTSPOTS),
        }
    }

    /// Trend for a catalog species
    ///
    /// A catalog species with no observations reports zero counts; an id
    /// outside the catalog yields `None`.
    pub fn species_trend(&self, state: &EngineState, species_id: &str) -> Option<SpeciesTrend> {
        let entry = self.catalog.get(species_id)?;
        let (count, trend, series) = match state.aggregates.species_history(species_id) {
            Some(history) => (history.count, history.trend, history.series),
            None => (0, 0.0, Vec::new()),
        };
        Some(SpeciesTrend {
            species_id: entry.species_id.clone(),
            common_name: entry.common_name.clone(),
            scientific_name: entry.scientific_name.clone(),
            conservation_status: entry.conservation_status,
            count,
            trend,
            series,
        })
    }

    pub fn hotspot_detail(&self, state: &EngineState, label: &str) -> Option<HotspotBreakdown> {
        state.aggregates.hotspot(label)
    }

    pub fn recent_observations(&self, state: &EngineState, n: usize) -> Vec<AnnotatedObservation> {
        state.aggregates.recent(n)
    }

    pub fn top_species(&self, state: &EngineState, n: usize) -> Vec<SpeciesCount> {
        state.aggregates.top_species(n)
    }

    pub fn hotspots(&self, state: &EngineState, n: usize) -> Vec<HotspotSummary> {
        state.aggregates.hotspots(n)
    }

    pub fn series(
        &self,
        state: &EngineState,
        from: Option<PeriodKey>,
        to: Option<PeriodKey>,
    ) -> Vec<SeriesPoint> {
        state.aggregates.series_for(from, to)
    }

    pub fn leaderboard(&self, state: &EngineState, n: usize) -> Vec<LeaderboardEntry> {
        state.ledger.leaderboard(n)
    }

    pub fn user_progress(&self, state: &EngineState, user_id: &str) -> Option<UserProgress> {
        state.ledger.progress(user_id)
    }
}
