//! SQLite observation journal
//!
//! One row per validated observation in the `observations` table created by
//! `bfly_common::db::init_database`. Rows are never updated or deleted.

use async_trait::async_trait;
use bfly_common::{Error, GeoPoint, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use crate::journal::ObservationJournal;
use crate::observation::{Observation, ObservationDraft};

#[derive(Debug, Clone)]
pub struct SqliteJournal {
    pool: SqlitePool,
}

impl SqliteJournal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of journaled observations
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn observation_from_row(row: &SqliteRow) -> Result<Observation> {
    let id_str: String = row.get("observation_id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| Error::Internal(format!("Invalid observation id '{}': {}", id_str, e)))?;

    let observed_str: String = row.get("observed_at");
    // Years outside 0000-9999 carry a sign, which strict RFC 3339 rejects
    let observed_at = observed_str
        .parse::<DateTime<Utc>>()
        .map_err(|e| Error::Internal(format!("Invalid observed_at '{}': {}", observed_str, e)))?;

    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let location = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
        _ => None,
    };

    // Rows were validated before they were written
    Ok(Observation::from_validated(
        id,
        ObservationDraft {
            image_ref: row.get("image_ref"),
            species_id: row.get("species_id"),
            confidence: row.get("confidence"),
            location,
            location_label: row.get("location_label"),
            observed_at,
            submitted_by: row.get("submitted_by"),
        },
    ))
}

#[async_trait]
impl ObservationJournal for SqliteJournal {
    async fn append(&self, observation: &Observation) -> Result<()> {
        let location = observation.location();
        sqlx::query(
            r#"
            INSERT INTO observations (
                observation_id, image_ref, species_id, confidence,
                latitude, longitude, location_label, observed_at, submitted_by
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(observation.id().to_string())
        .bind(observation.image_ref())
        .bind(observation.species_id())
        .bind(observation.confidence())
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .bind(observation.location_label())
        .bind(observation.observed_at().to_rfc3339())
        .bind(observation.submitted_by())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Observation>> {
        let rows = sqlx::query(
            r#"
            SELECT observation_id, image_ref, species_id, confidence,
                   latitude, longitude, location_label, observed_at, submitted_by
            FROM observations
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(observation_from_row).collect()
    }
}
