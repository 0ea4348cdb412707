//! SQLite snapshot store: one row per poll in the `data` table.
//!
//! The schema matches files written by earlier AhoyDTU loggers, so existing
//! `ahoydtu.sqlite` databases load unchanged. Read-write opens switch the
//! journal to WAL so a running poller and an analysis run can share the file.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};
use serde_json::Value;

use crate::analysis::decode::format_timestamp;
use crate::core::errors::{Result, TachoError};
use crate::live::poller::LiveSnapshot;
use crate::store::StoredRecord;

/// Handle on the snapshot database.
pub struct SnapshotStore {
    conn: Connection,
    path: PathBuf,
    read_only: bool,
}

impl SnapshotStore {
    /// Open (or create) the database at `path` for writing.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TachoError::io(parent, source))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(path, &e))?;

        apply_pragmas(&conn)?;
        apply_schema(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            read_only: false,
        })
    }

    /// Open an existing database read-only. A missing file is an error.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(TachoError::StoreUnavailable {
                path: path.to_path_buf(),
                details: "database file does not exist".to_string(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| unavailable(path, &e))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            read_only: true,
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Store one raw payload. Returns the new row id.
    pub fn append(&self, timestamp: &str, payload: &Value) -> Result<i64> {
        let json = serde_json::to_string(payload)?;
        self.conn
            .prepare_cached("INSERT INTO data (timestamp, json_data) VALUES (?1, ?2)")?
            .execute(params![timestamp, json])?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Store a polled snapshot stamped with its capture time.
    pub fn append_snapshot(&self, snapshot: &LiveSnapshot) -> Result<i64> {
        self.append(&format_timestamp(&snapshot.captured_at), &snapshot.payload)
    }

    /// Every stored row, ascending by id.
    ///
    /// Column types are not trusted: a cell that is not usable text reads as
    /// `None` and the decoder skips that row alone.
    pub fn records(&self) -> Result<Vec<StoredRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, timestamp, json_data FROM data ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRecord {
                    id: row.get(0)?,
                    timestamp: column_text(row.get_ref(1)?),
                    json_data: column_text(row.get_ref(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of stored rows.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Check that WAL mode is active (for diagnostics).
    pub fn is_wal_mode(&self) -> bool {
        self.conn
            .query_row("PRAGMA journal_mode", [], |row| row.get::<_, String>(0))
            .map(|mode| mode.eq_ignore_ascii_case("wal"))
            .unwrap_or(false)
    }
}

/// Text view of a loosely typed cell. Blobs count when they are UTF-8.
fn column_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            std::str::from_utf8(bytes).ok().map(str::to_string)
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null => None,
    }
}

fn unavailable(path: &Path, error: &rusqlite::Error) -> TachoError {
    TachoError::StoreUnavailable {
        path: path.to_path_buf(),
        details: error.to_string(),
    }
}

// ──────────────────── schema & pragmas ────────────────────

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(%mode, "requested WAL journal mode but sqlite refused");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT,
            json_data TEXT
        );",
    )?;
    Ok(())
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, SnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::open(&dir.path().join("ahoydtu.sqlite")).unwrap();
        (dir, store)
    }

    #[test]
    fn schema_created_and_wal_active() {
        let (_dir, store) = temp_store();
        assert!(store.is_wal_mode());
        assert!(!store.is_read_only());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn append_and_read_back_in_id_order() {
        let (_dir, store) = temp_store();
        let first = store
            .append("2024-01-01T00:00:05", &json!({"inverter": [[]]}))
            .unwrap();
        let second = store
            .append("2024-01-01T00:00:00", &json!({"inverter": []}))
            .unwrap();
        assert!(second > first);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[0].timestamp.as_deref(), Some("2024-01-01T00:00:05"));
        let payload: Value =
            serde_json::from_str(records[1].json_data.as_deref().unwrap()).unwrap();
        assert_eq!(payload, json!({"inverter": []}));
    }

    #[test]
    fn append_snapshot_uses_iso_capture_time() {
        let (_dir, store) = temp_store();
        let snapshot = LiveSnapshot {
            captured_at: chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_micro_opt(12, 30, 0, 125_000)
                .unwrap(),
            payload: json!({"inverter": [[{"fld": "P_AC", "val": "250.5"}]]}),
        };
        store.append_snapshot(&snapshot).unwrap();
        let records = store.records().unwrap();
        assert_eq!(
            records[0].timestamp.as_deref(),
            Some("2024-06-01T12:30:00.125000")
        );
    }

    #[test]
    fn null_columns_read_as_none() {
        let (_dir, store) = temp_store();
        store
            .conn
            .execute("INSERT INTO data (timestamp, json_data) VALUES (NULL, NULL)", [])
            .unwrap();
        let records = store.records().unwrap();
        assert_eq!(records[0].timestamp, None);
        assert_eq!(records[0].json_data, None);
    }

    #[test]
    fn blob_and_numeric_cells_do_not_fail_the_read() {
        let (_dir, store) = temp_store();
        let good = r#"{"inverter":[[{"fld":"P_AC","val":"100"}]]}"#;
        store
            .append("2024-01-01T00:00:00", &serde_json::from_str(good).unwrap())
            .unwrap();
        store
            .conn
            .execute(
                "INSERT INTO data (timestamp, json_data) VALUES ('2024-01-01T00:00:01', X'7B7D')",
                [],
            )
            .unwrap();
        store
            .conn
            .execute(
                "INSERT INTO data (timestamp, json_data) VALUES (X'FF', X'FFFE')",
                [],
            )
            .unwrap();
        store
            .conn
            .execute("INSERT INTO data (timestamp, json_data) VALUES (17, 3.5)", [])
            .unwrap();
        store
            .append("2024-01-01T00:00:02", &serde_json::from_str(good).unwrap())
            .unwrap();

        let records = store.records().unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].json_data.as_deref(), Some("{}"));
        assert_eq!(records[2].timestamp, None);
        assert_eq!(records[2].json_data, None);
        assert_eq!(records[3].timestamp.as_deref(), Some("17"));

        let dataset = crate::analysis::Dataset::load_from_store(&store);
        let d = &dataset.diagnostics;
        assert!(d.read_error.is_none());
        assert_eq!(d.rows_read, 5);
        assert_eq!(d.rows_accepted, 2);
        assert_eq!(d.no_inverter_data, 1);
        assert_eq!(d.bad_timestamp, 2);
        assert_eq!(dataset.series.get("P_AC").unwrap().len(), 2);
    }

    #[test]
    fn open_existing_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnapshotStore::open_existing(&dir.path().join("absent.sqlite"))
            .err()
            .unwrap();
        assert_eq!(err.code(), "TCH-2001");
    }

    #[test]
    fn open_existing_reads_rows_written_elsewhere() {
        let (dir, store) = temp_store();
        store
            .append("2024-01-01T00:00:00", &json!({"inverter": []}))
            .unwrap();
        let path = store.path().to_path_buf();
        drop(store);

        let reader = SnapshotStore::open_existing(&path).unwrap();
        assert!(reader.is_read_only());
        assert_eq!(reader.count().unwrap(), 1);
        drop(dir);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let (_dir, store) = temp_store();
        let path = store.path().to_path_buf();
        drop(store);

        let reader = SnapshotStore::open_existing(&path).unwrap();
        assert!(reader.append("2024-01-01T00:00:00", &json!({})).is_err());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/ahoydtu.sqlite");
        let store = SnapshotStore::open(&nested).unwrap();
        assert!(nested.is_file());
        assert_eq!(store.path(), nested.as_path());
    }

    #[test]
    fn idempotent_schema_creation() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("idempotent.sqlite");
        let _ = SnapshotStore::open(&db_path).unwrap();
        let store = SnapshotStore::open(&db_path).unwrap();
        assert!(store.is_wal_mode());
    }
}
