//! Aggregation Store
//!
//! Running research statistics folded from accepted observations:
//! global totals, per-species counts and trends, per-location hotspots,
//! the monthly seasonal series, and a bounded window of recent records.
//!
//! Every number here is a pure fold over the observation history. The only
//! mutation entry point is [`AggregationStore::fold`], which ignores ids it
//! has already seen.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::Bound;

use bfly_common::PeriodKey;
use serde::Serialize;

use crate::conservation::ConservationAnnotation;
use crate::observation::{Observation, ObservationId};

/// Observation together with its conservation annotation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedObservation {
    pub observation: Observation,
    pub annotation: ConservationAnnotation,
}

/// Result of folding one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Applied,
    /// Id already folded; nothing changed
    Duplicate,
}

/// Species count with trend vs. the previous month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesCount {
    pub species_id: String,
    pub count: u64,
    /// `(current - previous) / max(previous, 1)`; 0.12 means +12%
    pub trend: f64,
}

/// Hotspot list row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotSummary {
    pub label: String,
    pub count: u64,
    pub distinct_species: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesTally {
    pub species_id: String,
    pub count: u64,
}

/// Full breakdown of one hotspot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotBreakdown {
    pub label: String,
    pub count: u64,
    pub distinct_species: usize,
    /// Most observed first
    pub species: Vec<SpeciesTally>,
}

/// One bucket of a monthly series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: PeriodKey,
    pub month: String,
    pub count: u64,
}

impl SeriesPoint {
    fn new(period: PeriodKey, count: u64) -> Self {
        Self {
            period,
            month: period.month_label().to_string(),
            count,
        }
    }
}

/// Per-species counts, trend and monthly history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesHistory {
    pub species_id: String,
    pub count: u64,
    pub trend: f64,
    pub series: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Default)]
struct SpeciesAggregate {
    count: u64,
    by_period: BTreeMap<PeriodKey, u64>,
    trend: f64,
}

impl SpeciesAggregate {
    fn recompute_trend(&mut self) {
        self.trend = period_trend(&self.by_period);
    }
}

#[derive(Debug, Clone, Default)]
struct HotspotAggregate {
    count: u64,
    species: BTreeMap<String, u64>,
}

/// Trend of the latest period against the calendar month before it
fn period_trend(series: &BTreeMap<PeriodKey, u64>) -> f64 {
    match series.iter().next_back() {
        Some((latest, &current)) => {
            let previous = series.get(&latest.previous()).copied().unwrap_or(0);
            (current as f64 - previous as f64) / previous.max(1) as f64
        }
        None => 0.0,
    }
}

/// Running aggregate state
#[derive(Debug)]
pub struct AggregationStore {
    seen: HashSet<ObservationId>,
    total: u64,
    unlabeled: u64,
    conservation_alerts: u64,
    species: HashMap<String, SpeciesAggregate>,
    hotspots: HashMap<String, HotspotAggregate>,
    series: BTreeMap<PeriodKey, u64>,
    recent: VecDeque<AnnotatedObservation>,
    recent_capacity: usize,
}

impl AggregationStore {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            total: 0,
            unlabeled: 0,
            conservation_alerts: 0,
            species: HashMap::new(),
            hotspots: HashMap::new(),
            series: BTreeMap::new(),
            recent: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
        }
    }

    /// Fold one annotated observation into the aggregates
    pub fn fold(&mut self, record: &AnnotatedObservation) -> FoldOutcome {
        let observation = &record.observation;
        if !self.seen.insert(observation.id()) {
            return FoldOutcome::Duplicate;
        }

        let period = PeriodKey::from_datetime(&observation.observed_at());
        self.total += 1;

        let species = self
            .species
            .entry(observation.species_id().to_string())
            .or_default();
        species.count += 1;
        *species.by_period.entry(period).or_insert(0) += 1;
        species.recompute_trend();

        match observation.location_label() {
            Some(label) => {
                let hotspot = self.hotspots.entry(label.to_string()).or_default();
                hotspot.count += 1;
                *hotspot
                    .species
                    .entry(observation.species_id().to_string())
                    .or_insert(0) += 1;
            }
            None => self.unlabeled += 1,
        }

        *self.series.entry(period).or_insert(0) += 1;

        if record.annotation.alert {
            self.conservation_alerts += 1;
        }

        if self.recent_capacity > 0 {
            self.recent.push_front(record.clone());
            self.recent.truncate(self.recent_capacity);
        }

        FoldOutcome::Applied
    }

    pub fn total_observations(&self) -> u64 {
        self.total
    }

    /// Observations folded without a location label
    pub fn unlabeled_observations(&self) -> u64 {
        self.unlabeled
    }

    pub fn conservation_alerts(&self) -> u64 {
        self.conservation_alerts
    }

    /// Number of distinct species with at least one observation
    pub fn species_observed(&self) -> usize {
        self.species.len()
    }

    pub fn hotspot_count(&self) -> usize {
        self.hotspots.len()
    }

    pub fn species_count(&self, species_id: &str) -> Option<SpeciesCount> {
        self.species.get(species_id).map(|s| SpeciesCount {
            species_id: species_id.to_string(),
            count: s.count,
            trend: s.trend,
        })
    }

    /// Most observed species first; ties broken by species id
    pub fn top_species(&self, n: usize) -> Vec<SpeciesCount> {
        let mut rows: Vec<SpeciesCount> = self
            .species
            .iter()
            .map(|(id, s)| SpeciesCount {
                species_id: id.clone(),
                count: s.count,
                trend: s.trend,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.species_id.cmp(&b.species_id)));
        rows.truncate(n);
        rows
    }

    /// Busiest hotspots first; ties broken by label
    pub fn hotspots(&self, n: usize) -> Vec<HotspotSummary> {
        let mut rows: Vec<HotspotSummary> = self
            .hotspots
            .iter()
            .map(|(label, h)| HotspotSummary {
                label: label.clone(),
                count: h.count,
                distinct_species: h.species.len(),
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        rows.truncate(n);
        rows
    }

    pub fn hotspot(&self, label: &str) -> Option<HotspotBreakdown> {
        self.hotspots.get(label).map(|h| {
            let mut species: Vec<SpeciesTally> = h
                .species
                .iter()
                .map(|(id, &count)| SpeciesTally {
                    species_id: id.clone(),
                    count,
                })
                .collect();
            species.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.species_id.cmp(&b.species_id)));
            HotspotBreakdown {
                label: label.to_string(),
                count: h.count,
                distinct_species: h.species.len(),
                species,
            }
        })
    }

    /// Sum of all hotspot counts
    pub fn labeled_total(&self) -> u64 {
        self.hotspots.values().map(|h| h.count).sum()
    }

    /// Seasonal series restricted to an inclusive period range
    ///
    /// Either end may be open. An inverted range yields an empty series.
    pub fn series_for(&self, from: Option<PeriodKey>, to: Option<PeriodKey>) -> Vec<SeriesPoint> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Vec::new();
            }
        }
        let lower = from.map_or(Bound::Unbounded, Bound::Included);
        let upper = to.map_or(Bound::Unbounded, Bound::Included);
        self.series
            .range((lower, upper))
            .map(|(&period, &count)| SeriesPoint::new(period, count))
            .collect()
    }

    pub fn species_history(&self, species_id: &str) -> Option<SpeciesHistory> {
        self.species.get(species_id).map(|s| SpeciesHistory {
            species_id: species_id.to_string(),
            count: s.count,
            trend: s.trend,
            series: s
                .by_period
                .iter()
                .map(|(&period, &count)| SeriesPoint::new(period, count))
                .collect(),
        })
    }

    /// Busiest month; the earliest wins a tie
    pub fn peak_period(&self) -> Option<SeriesPoint> {
        let mut peak: Option<(PeriodKey, u64)> = None;
        for (&period, &count) in &self.series {
            if peak.map_or(true, |(_, best)| count > best) {
                peak = Some((period, count));
            }
        }
        peak.map(|(period, count)| SeriesPoint::new(period, count))
    }

    /// Latest month against the month before it, across all species
    pub fn overall_trend(&self) -> f64 {
        period_trend(&self.series)
    }

    /// Most recent first
    pub fn recent(&self, n: usize) -> Vec<AnnotatedObservation> {
        self.recent.iter().take(n).cloned().collect()
    }
}
