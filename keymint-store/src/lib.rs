//! SQLite persistence for Keymint.
//!
//! [`SqliteStore`] implements `keymint_core::LicenseStore` over a bundled
//! SQLite database: one serialized connection, WAL journaling, and a
//! foreign-key cascade from licenses to their audit entries. Timestamps are
//! stored as epoch milliseconds.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;
