//! Snapshot persistence: raw live payloads stored as JSON text in SQLite.

#![allow(missing_docs)]

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SnapshotStore;

/// One persisted row as read back from the `data` table.
///
/// Columns are nullable in the legacy schema, so both stay optional here and
/// the decoder decides what to make of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub timestamp: Option<String>,
    pub json_data: Option<String>,
}
