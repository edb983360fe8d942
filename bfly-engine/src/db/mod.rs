//! Database access for the engine

pub mod observations;

pub use observations::SqliteJournal;
