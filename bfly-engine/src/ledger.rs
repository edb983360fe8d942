//! Progress Ledger
//!
//! Per-user points, levels and achievements. Points only increase through
//! recorded observations and achievements are never revoked.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::observation::{Observation, ObservationId};

/// Points per level
pub const LEVEL_SPAN: u64 = 500;

/// Achievement definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

/// Declarative unlock rule: an achievement and the predicate that grants it
pub struct AchievementRule {
    pub achievement: Achievement,
    predicate: fn(&LedgerEntry) -> bool,
}

impl AchievementRule {
    pub fn is_satisfied(&self, entry: &LedgerEntry) -> bool {
        (self.predicate)(entry)
    }
}

fn has_first_observation(entry: &LedgerEntry) -> bool {
    entry.observations >= 1
}

fn has_three_species(entry: &LedgerEntry) -> bool {
    entry.species.len() >= 3
}

fn has_five_geotagged(entry: &LedgerEntry) -> bool {
    entry.geotagged >= 5
}

fn has_expert_points(entry: &LedgerEntry) -> bool {
    entry.points >= 300
}

/// Rules evaluated in this order after every recorded observation
pub static ACHIEVEMENT_RULES: &[AchievementRule] = &[
    AchievementRule {
        achievement: Achievement {
            id: "first_identification",
            title: "First Identification",
            description: "Identified your first butterfly",
        },
        predicate: has_first_observation,
    },
    AchievementRule {
        achievement: Achievement {
            id: "species_explorer",
            title: "Species Explorer",
            description: "Identified 3 different species",
        },
        predicate: has_three_species,
    },
    AchievementRule {
        achievement: Achievement {
            id: "field_mapper",
            title: "Field Mapper",
            description: "Submitted 5 geotagged observations",
        },
        predicate: has_five_geotagged,
    },
    AchievementRule {
        achievement: Achievement {
            id: "butterfly_expert",
            title: "Butterfly Expert",
            description: "Reached 300 points",
        },
        predicate: has_expert_points,
    },
];

/// One user's progress
#[derive(Debug, Clone, Default)]
pub struct LedgerEntry {
    user_id: String,
    points: u64,
    /// Unlock order
    unlocked: Vec<Achievement>,
    observations: u64,
    species: BTreeSet<String>,
    geotagged: u64,
    seen: HashSet<ObservationId>,
}

impl LedgerEntry {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Self::default()
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn level(&self) -> u64 {
        self.points / LEVEL_SPAN + 1
    }

    /// Points earned toward the next level
    pub fn level_progress(&self) -> u64 {
        self.points % LEVEL_SPAN
    }

    pub fn unlocked(&self) -> &[Achievement] {
        &self.unlocked
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn distinct_species(&self) -> usize {
        self.species.len()
    }

    pub fn geotagged(&self) -> u64 {
        self.geotagged
    }

    fn has_unlocked(&self, id: &str) -> bool {
        self.unlocked.iter().any(|a| a.id == id)
    }
}

/// Effect of recording one observation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerUpdate {
    pub points_awarded: u64,
    pub newly_unlocked: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub points: u64,
    pub level: u64,
    pub observations: u64,
    pub achievements: usize,
}

/// Snapshot of a user's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProgress {
    pub user_id: String,
    pub points: u64,
    pub level: u64,
    pub level_progress: u64,
    pub level_span: u64,
    pub observations: u64,
    pub distinct_species: usize,
    pub geotagged: u64,
    pub unlocked: Vec<Achievement>,
    pub locked: Vec<Achievement>,
}

impl From<&LedgerEntry> for UserProgress {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            user_id: entry.user_id.clone(),
            points: entry.points,
            level: entry.level(),
            level_progress: entry.level_progress(),
            level_span: LEVEL_SPAN,
            observations: entry.observations,
            distinct_species: entry.species.len(),
            geotagged: entry.geotagged,
            unlocked: entry.unlocked.clone(),
            locked: ACHIEVEMENT_RULES
                .iter()
                .map(|rule| rule.achievement)
                .filter(|a| !entry.has_unlocked(a.id))
                .collect(),
        }
    }
}

/// Per-user progress keyed by user id
#[derive(Debug)]
pub struct ProgressLedger {
    base_points: u64,
    entries: HashMap<String, LedgerEntry>,
}

impl ProgressLedger {
    pub fn new(base_points: u64) -> Self {
        Self {
            base_points,
            entries: HashMap::new(),
        }
    }

    /// Credit an observation to a user and evaluate the rule table
    ///
    /// Recording an observation id the user already has awards nothing.
    pub fn record(&mut self, user_id: &str, observation: &Observation) -> LedgerUpdate {
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| LedgerEntry::new(user_id));

        if !entry.seen.insert(observation.id()) {
            return LedgerUpdate::default();
        }

        entry.points = entry.points.saturating_add(self.base_points);
        entry.observations += 1;
        entry.species.insert(observation.species_id().to_string());
        if observation.location().is_some() {
            entry.geotagged += 1;
        }

        let mut newly_unlocked = Vec::new();
        for rule in ACHIEVEMENT_RULES {
            if !entry.has_unlocked(rule.achievement.id) && rule.is_satisfied(entry) {
                entry.unlocked.push(rule.achievement);
                newly_unlocked.push(rule.achievement);
            }
        }

        LedgerUpdate {
            points_awarded: self.base_points,
            newly_unlocked,
        }
    }

    pub fn entry(&self, user_id: &str) -> Option<&LedgerEntry> {
        self.entries.get(user_id)
    }

    pub fn progress(&self, user_id: &str) -> Option<UserProgress> {
        self.entries.get(user_id).map(UserProgress::from)
    }

    /// Highest points first; ties broken by user id
    pub fn leaderboard(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<&LedgerEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.user_id.cmp(&b.user_id)));
        entries
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, e)| LeaderboardEntry {
                rank: i + 1,
                user_id: e.user_id.clone(),
                points: e.points,
                level: e.level(),
                observations: e.observations,
                achievements: e.unlocked.len(),
            })
            .collect()
    }

    /// Number of users with at least one recorded observation
    pub fn contributors(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationDraft;
    use bfly_common::GeoPoint;
    use uuid::Uuid;

    fn observation(user: &str, species: &str, geotagged: bool) -> Observation {
        Observation::from_validated(
            Uuid::new_v4(),
            ObservationDraft {
                image_ref: "img".to_string(),
                species_id: species.to_string(),
                confidence: 0.9,
                location: geotagged.then(|| GeoPoint::new(51.5, -0.1)),
                location_label: None,
                observed_at: chrono::Utc::now(),
                submitted_by: user.to_string(),
            },
        )
    }

    fn ids(achievements: &[Achievement]) -> Vec<&'static str> {
        achievements.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_first_observation_unlocks_once() {
        let mut ledger = ProgressLedger::new(10);
        let first = ledger.record("alex", &observation("alex", "monarch", false));
        assert_eq!(first.points_awarded, 10);
        assert_eq!(ids(&first.newly_unlocked), vec!["first_identification"]);

        let second = ledger.record("alex", &observation("alex", "monarch", false));
        assert_eq!(second.points_awarded, 10);
        assert!(second.newly_unlocked.is_empty());
        assert_eq!(ledger.entry("alex").unwrap().points(), 20);
    }

    #[test]
    fn test_duplicate_observation_awards_nothing() {
        let mut ledger = ProgressLedger::new(10);
        let obs = observation("alex", "monarch", true);
        ledger.record("alex", &obs);
        let again = ledger.record("alex", &obs);
        assert_eq!(again, LedgerUpdate::default());
        let entry = ledger.entry("alex").unwrap();
        assert_eq!(entry.points(), 10);
        assert_eq!(entry.observations(), 1);
        assert_eq!(entry.geotagged(), 1);
    }

    #[test]
    fn test_species_explorer_on_third_distinct_species() {
        let mut ledger = ProgressLedger::new(10);
        ledger.record("sam", &observation("sam", "monarch", false));
        ledger.record("sam", &observation("sam", "monarch", false));
        let update = ledger.record("sam", &observation("sam", "red_admiral", false));
        assert!(update.newly_unlocked.is_empty());
        let update = ledger.record("sam", &observation("sam", "painted_lady", false));
        assert_eq!(ids(&update.newly_unlocked), vec!["species_explorer"]);
    }

    #[test]
    fn test_field_mapper_counts_only_geotagged() {
        let mut ledger = ProgressLedger::new(10);
        for _ in 0..4 {
            ledger.record("kim", &observation("kim", "monarch", true));
        }
        let update = ledger.record("kim", &observation("kim", "monarch", false));
        assert!(update.newly_unlocked.is_empty());
        let update = ledger.record("kim", &observation("kim", "monarch", true));
        assert_eq!(ids(&update.newly_unlocked), vec!["field_mapper"]);
    }

    #[test]
    fn test_unlocks_in_rule_order_within_one_record() {
        // Large base points satisfy expert on the first record
        let mut ledger = ProgressLedger::new(300);
        let update = ledger.record("pat", &observation("pat", "monarch", false));
        assert_eq!(
            ids(&update.newly_unlocked),
            vec!["first_identification", "butterfly_expert"]
        );
        assert_eq!(
            ids(ledger.entry("pat").unwrap().unlocked()),
            vec!["first_identification", "butterfly_expert"]
        );
    }

    #[test]
    fn test_unlocked_is_monotonic() {
        let mut ledger = ProgressLedger::new(10);
        let mut previous = 0;
        for species in ["monarch", "red_admiral", "painted_lady", "monarch", "cabbage_white"] {
            ledger.record("lee", &observation("lee", species, true));
            let now = ledger.entry("lee").unwrap().unlocked().len();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn test_level_and_progress() {
        let mut ledger = ProgressLedger::new(260);
        ledger.record("max", &observation("max", "monarch", false));
        ledger.record("max", &observation("max", "monarch", false));
        let progress = ledger.progress("max").unwrap();
        assert_eq!(progress.points, 520);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.level_progress, 20);
        assert_eq!(progress.locked.len() + progress.unlocked.len(), ACHIEVEMENT_RULES.len());
        assert!(ledger.progress("nobody").is_none());
    }

    #[test]
    fn test_leaderboard_ordering() {
        let mut ledger = ProgressLedger::new(10);
        ledger.record("bea", &observation("bea", "monarch", false));
        ledger.record("ann", &observation("ann", "monarch", false));
        ledger.record("cal", &observation("cal", "monarch", false));
        ledger.record("cal", &observation("cal", "monarch", false));

        let board = ledger.leaderboard(10);
        let users: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(users, vec!["cal", "ann", "bea"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].points, 20);
        assert_eq!(ledger.leaderboard(1).len(), 1);
        assert_eq!(ledger.contributors(), 3);
    }
}
