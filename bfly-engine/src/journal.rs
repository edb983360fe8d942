//! Observation journal
//!
//! Append-only log of validated observations. Aggregates and the ledger are
//! rebuilt from it at startup, so it is the only state that must survive a
//! restart.

use std::sync::Mutex;

use async_trait::async_trait;
use bfly_common::{Error, Result};

use crate::observation::Observation;

#[async_trait]
pub trait ObservationJournal: Send + Sync {
    /// Durably record one validated observation
    async fn append(&self, observation: &Observation) -> Result<()>;

    /// All journaled observations in append order
    async fn load_all(&self) -> Result<Vec<Observation>>;
}

/// Process-local journal
///
/// Nothing survives a restart. Used when persistence is disabled and by tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    records: Mutex<Vec<Observation>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObservationJournal for MemoryJournal {
    async fn append(&self, observation: &Observation) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::Internal("journal lock poisoned".to_string()))?;
        if records.iter().any(|r| r.id() == observation.id()) {
            return Err(Error::InvalidInput(format!(
                "observation {} already journaled",
                observation.id()
            )));
        }
        records.push(observation.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Observation>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Internal("journal lock poisoned".to_string()))?;
        Ok(records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ObservationDraft;
    use uuid::Uuid;

    fn observation(species: &str) -> Observation {
        Observation::from_validated(
            Uuid::new_v4(),
            ObservationDraft {
                image_ref: "img".to_string(),
                species_id: species.to_string(),
                confidence: 0.8,
                location: None,
                location_label: None,
                observed_at: chrono::Utc::now(),
                submitted_by: "u".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_memory_journal_preserves_order_and_rejects_repeats() {
        let journal = MemoryJournal::new();
        let a = observation("monarch");
        let b = observation("red_admiral");
        journal.append(&a).await.unwrap();
        journal.append(&b).await.unwrap();
        assert!(journal.append(&a).await.is_err());

        let loaded = journal.load_all().await.unwrap();
        assert_eq!(loaded, vec![a, b]);
        assert_eq!(journal.len(), 2);
    }
}
