//! # BFLY Common Library
//!
//! Shared code for the BFLY observation engine and its tooling:
//! - Species catalog (static reference data)
//! - Geocoordinates and calendar period keys
//! - Event types (BflyEvent enum) and EventBus
//! - Configuration loading
//! - Database initialization

pub mod catalog;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod geo;
pub mod time;

pub use catalog::{ConservationStatus, SpeciesCatalog, SpeciesEntry};
pub use error::{Error, Result};
pub use geo::GeoPoint;
pub use time::PeriodKey;
