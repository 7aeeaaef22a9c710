//! Schema migrations for `SqliteStore`
//!
//! Each migration is applied once, in version order, inside its own
//! transaction together with its `schema_migrations` row.

/// One versioned schema step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Every migration, ascending by version
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "key-value table",
    sql: "CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
}];

/// Bookkeeping table; created before any migration runs
pub const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// Version a fully migrated database reports
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Migrations newer than `applied`, in the order they must run
pub fn pending(applied: i32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS.iter().filter(move |m| m.version > applied)
}
