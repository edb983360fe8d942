//! Species catalog
//!
//! Static reference data keyed by species id. The catalog is loaded once at
//! startup (TOML file or the built-in set) and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::{Error, Result};

/// IUCN-style conservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConservationStatus {
    LeastConcern,
    NearThreatened,
    Vulnerable,
    Endangered,
    CriticallyEndangered,
}

impl ConservationStatus {
    /// Human-readable label
    pub fn as_str(&self) -> &'static str {
        match self {
            ConservationStatus::LeastConcern => "Least Concern",
            ConservationStatus::NearThreatened => "Near Threatened",
            ConservationStatus::Vulnerable => "Vulnerable",
            ConservationStatus::Endangered => "Endangered",
            ConservationStatus::CriticallyEndangered => "Critically Endangered",
        }
    }

    /// Vulnerable or worse
    pub fn is_threatened(&self) -> bool {
        matches!(
            self,
            ConservationStatus::Vulnerable
                | ConservationStatus::Endangered
                | ConservationStatus::CriticallyEndangered
        )
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub species_id: String,
    pub common_name: String,
    pub scientific_name: String,
    pub family: String,
    /// Ordered short descriptors ("Orange wings", "Black borders", ...)
    #[serde(default)]
    pub characteristics: Vec<String>,
    pub conservation_status: ConservationStatus,
    #[serde(default)]
    pub conservation_notes: String,
    #[serde(default)]
    pub habitat: String,
    #[serde(default)]
    pub flight_period: String,
    #[serde(default)]
    pub fun_fact: String,
}

/// On-disk catalog layout: a list of `[[species]]` tables
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    species: Vec<SpeciesEntry>,
}

/// Immutable species catalog
#[derive(Debug, Clone)]
pub struct SpeciesCatalog {
    entries: Vec<SpeciesEntry>,
    index: HashMap<String, usize>,
}

impl SpeciesCatalog {
    /// Build a catalog from entries, rejecting blank or duplicate species ids
    pub fn from_entries(entries: Vec<SpeciesEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.species_id.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Catalog entry #{} has an empty species_id",
                    position + 1
                )));
            }
            if index.insert(entry.species_id.clone(), position).is_some() {
                return Err(Error::Config(format!(
                    "Duplicate species_id in catalog: {}",
                    entry.species_id
                )));
            }
        }
        Ok(Self { entries, index })
    }

    /// Parse a catalog from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse catalog failed: {}", e)))?;
        Self::from_entries(file.species)
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read catalog {} failed: {}", path.display(), e)))?;
        let catalog = Self::from_toml_str(&content)?;
        info!("Loaded {} species from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Look up an entry by species id
    pub fn get(&self, species_id: &str) -> Option<&SpeciesEntry> {
        self.index.get(species_id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, species_id: &str) -> bool {
        self.index.contains_key(species_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in load order
    pub fn entries(&self) -> &[SpeciesEntry] {
        &self.entries
    }

    /// Built-in catalog used when no catalog file is configured
    pub fn builtin() -> Self {
        let entries = vec![
            entry(
                "monarch",
                "Monarch Butterfly",
                "Danaus plexippus",
                "Nymphalidae",
                &["Orange wings", "Black borders", "White spots", "Large size"],
                ConservationStatus::Vulnerable,
                "Population declining due to habitat loss and climate change. Important pollinator species.",
                "Gardens, fields, meadows, and roadsides with milkweed plants",
                "March through October, with peak activity in summer",
                "Monarchs can travel up to 3,000 miles during migration, using magnetic fields and sun position for navigation.",
            ),
            entry(
                "painted_lady",
                "Painted Lady",
                "Vanessa cardui",
                "Nymphalidae",
                &["Orange-brown wings", "Black spots", "White markings", "Medium size"],
                ConservationStatus::LeastConcern,
                "Stable population with global distribution. Highly adaptable species.",
                "Open areas including gardens, fields, and disturbed habitats",
                "Year-round in warm climates, spring through fall in temperate regions",
                "One of the most widely distributed butterflies in the world, found on every continent except Antarctica.",
            ),
            entry(
                "red_admiral",
                "Red Admiral",
                "Vanessa atalanta",
                "Nymphalidae",
                &["Dark wings", "Red bands", "White spots", "Distinctive pattern"],
                ConservationStatus::LeastConcern,
                "Common and widespread species with stable populations.",
                "Gardens, parks, woodlands, and areas with nettle plants",
                "March through October, with multiple generations per year",
                "Known for their territorial behavior, males will defend favorite perches and chase away intruders.",
            ),
            entry(
                "cabbage_white",
                "Cabbage White",
                "Pieris rapae",
                "Pieridae",
                &["White wings", "Black spots", "Small size", "Simple pattern"],
                ConservationStatus::LeastConcern,
                "Very common species, sometimes considered a garden pest.",
                "Gardens, agricultural areas, and open spaces with cruciferous plants",
                "March through November, with multiple overlapping generations",
                "Originally from Europe, this butterfly has successfully colonized most of the world.",
            ),
            entry(
                "eastern_tiger_swallowtail",
                "Eastern Tiger Swallowtail",
                "Papilio glaucus",
                "Papilionidae",
                &["Yellow wings", "Black stripes", "Large size", "Tail extensions"],
                ConservationStatus::LeastConcern,
                "Common in eastern North America with healthy populations.",
                "Deciduous forests, parks, and gardens with trees",
                "March through November, with two generations per year",
                "Females can be either yellow like males or dark brown/black as a form of mimicry.",
            ),
        ];

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.species_id.clone(), i))
            .collect();
        Self { entries, index }
    }
}

#[allow(clippy::too_many_arguments)]
fn entry(
    species_id: &str,
    common_name: &str,
    scientific_name: &str,
    family: &str,
    characteristics: &[&str],
    conservation_status: ConservationStatus,
    conservation_notes: &str,
    habitat: &str,
    flight_period: &str,
    fun_fact: &str,
) -> SpeciesEntry {
    SpeciesEntry {
        species_id: species_id.to_string(),
        common_name: common_name.to_string(),
        scientific_name: scientific_name.to_string(),
        family: family.to_string(),
        characteristics: characteristics.iter().map(|c| c.to_string()).collect(),
        conservation_status,
        conservation_notes: conservation_notes.to_string(),
        habitat: habitat.to_string(),
        flight_period: flight_period.to_string(),
        fun_fact: fun_fact.to_string(),
    }
}
