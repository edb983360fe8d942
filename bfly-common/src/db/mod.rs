//! Database initialization shared by BFLY binaries and tests

pub mod init;

pub use init::{create_observations_table, init_database};
