//! Postgres access layer: pool construction, embedded migrations, and the
//! concrete implementations of the storage traits. Everything lives in the
//! `mb` schema.

mod candidates;
mod jobs;
mod match_results;
mod migrations;
mod pool;
mod settings;
mod usage_records;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use candidates::PgProfileReader;
pub use jobs::PgJobCatalog;
pub use match_results::PgMatchStore;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool_from_url, create_pool_from_url_checked, DbPoolError, PgPool};
pub use settings::PgSettingsProvider;
pub use usage_records::PgUsageStore;
