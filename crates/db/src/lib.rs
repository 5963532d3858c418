pub mod catalog;
pub mod connection;
pub mod errors;
pub mod fixtures;
pub mod migrations;

pub use catalog::SqlCatalogSource;
pub use connection::{connect_with_config, connect_with_settings, ping, DbPool};
pub use errors::RepositoryError;
pub use fixtures::{DemoCatalog, SeedResult, VerificationResult};
