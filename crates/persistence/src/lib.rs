#![deny(warnings)]

//! Persistence layer: the versioned save envelope, the schema migrator and a
//! SQLite save-slot store.
//!
//! Loading goes through [`migrate()`], which accepts any historical save
//! shape as untyped JSON and always yields a current-version envelope.

pub mod envelope;
pub mod migrate;
pub mod normalize;
pub mod store;

pub use envelope::SaveEnvelope;
pub use migrate::{migrate, migrate_value, CURRENT_SCHEMA_VERSION, OLDEST_SCHEMA_VERSION};
pub use store::{delete_save, init_db, list_slots, read_save, write_save};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/village.db"
}
