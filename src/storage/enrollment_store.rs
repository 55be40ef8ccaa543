use crate::common::{FaceAppError, Result};
use crate::core::descriptor::Descriptor;
use crate::core::record::{Account, EnrollmentRecord};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Deserialize;
use std::path::Path;

/// What an `enroll` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollOutcome {
    pub created: bool,
    pub added: usize,
    pub total: usize,
}

pub trait EnrollmentStore {
    /// Creates the record for a new username or appends to an existing one.
    /// The full name of an existing account is left untouched.
    fn enroll(&self, username: &str, full_name: &str, descriptors: &[Descriptor]) -> Result<EnrollOutcome>;

    /// Snapshot of every record, in insertion order.
    fn all_records(&self) -> Result<Vec<EnrollmentRecord>>;

    fn get_record(&self, username: &str) -> Result<Option<EnrollmentRecord>>;
}

/// The `encoding` column: an array of descriptors, or a single flat array
/// from rows written before accounts could hold more than one.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEncoding {
    Many(Vec<Descriptor>),
    Single(Descriptor),
}

impl StoredEncoding {
    fn into_descriptors(self) -> Vec<Descriptor> {
        match self {
            StoredEncoding::Many(descriptors) => descriptors,
            StoredEncoding::Single(descriptor) => vec![descriptor],
        }
    }
}

fn decode_encoding(username: &str, encoding: &str) -> Result<Vec<Descriptor>> {
    let stored: StoredEncoding = serde_json::from_str(encoding).map_err(|e| {
        FaceAppError::PersistenceRead(format!("Corrupt encoding for {}: {}", username, e))
    })?;
    Ok(stored.into_descriptors())
}

fn persistence_error(err: rusqlite::Error) -> FaceAppError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation)
        | Some(ErrorCode::DatabaseBusy)
        | Some(ErrorCode::DatabaseLocked) => FaceAppError::PersistenceWriteConflict(err.to_string()),
        _ => FaceAppError::PersistenceUnavailable(err.to_string()),
    }
}

/// A SELECT failed on a database that opened fine.
fn read_error(err: rusqlite::Error) -> FaceAppError {
    FaceAppError::PersistenceRead(err.to_string())
}

pub struct SqliteEnrollmentStore {
    connection: Connection,
}

impl SqliteEnrollmentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path).map_err(|e| {
            FaceAppError::PersistenceUnavailable(format!("Failed to open {}: {}", path.display(), e))
        })?;
        tracing::debug!("Opened enrollment database {}", path.display());
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(persistence_error)?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        let store = Self { connection };
        store.init()?;
        Ok(store)
    }

    /// Creates the `users` table if it does not exist yet.
    pub fn init(&self) -> Result<()> {
        self.connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                username TEXT UNIQUE NOT NULL,
                encoding TEXT NOT NULL
            );",
        ).map_err(persistence_error)?;
        Ok(())
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<(String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn into_record((full_name, username, encoding): (String, String, String)) -> Result<EnrollmentRecord> {
        let descriptors = decode_encoding(&username, &encoding)?;
        Ok(EnrollmentRecord {
            account: Account { username, full_name },
            descriptors,
        })
    }

    fn enroll_in(tx: &Transaction, username: &str, full_name: &str, descriptors: &[Descriptor]) -> Result<EnrollOutcome> {
        let existing: Option<String> = tx
            .query_row("SELECT encoding FROM users WHERE username = ?", params![username], |row| row.get(0))
            .optional()
            .map_err(persistence_error)?;

        match existing {
            Some(encoding) => {
                let mut stored = decode_encoding(username, &encoding)?;
                stored.extend_from_slice(descriptors);
                tx.execute(
                    "UPDATE users SET encoding = ? WHERE username = ?",
                    params![serde_json::to_string(&stored)?, username],
                ).map_err(persistence_error)?;
                Ok(EnrollOutcome { created: false, added: descriptors.len(), total: stored.len() })
            }
            None => {
                tx.execute(
                    "INSERT INTO users (full_name, username, encoding) VALUES (?, ?, ?)",
                    params![full_name, username, serde_json::to_string(descriptors)?],
                ).map_err(persistence_error)?;
                Ok(EnrollOutcome { created: true, added: descriptors.len(), total: descriptors.len() })
            }
        }
    }
}

impl EnrollmentStore for SqliteEnrollmentStore {
    fn enroll(&self, username: &str, full_name: &str, descriptors: &[Descriptor]) -> Result<EnrollOutcome> {
        if descriptors.is_empty() {
            return Err(FaceAppError::NoFaceDetected);
        }

        let tx = Transaction::new_unchecked(&self.connection, TransactionBehavior::Immediate)
            .map_err(persistence_error)?;
        let outcome = Self::enroll_in(&tx, username, full_name, descriptors)?;
        tx.commit().map_err(persistence_error)?;

        tracing::info!("Enrolled {} descriptor(s) for {} ({} total, new account: {})",
            outcome.added, username, outcome.total, outcome.created);
        Ok(outcome)
    }

    fn all_records(&self) -> Result<Vec<EnrollmentRecord>> {
        let mut statement = self.connection
            .prepare("SELECT full_name, username, encoding FROM users ORDER BY id")
            .map_err(read_error)?;
        let rows = statement
            .query_map([], Self::row_to_record)
            .map_err(read_error)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()
            .map_err(read_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let username = row.1.clone();
            match Self::into_record(row) {
                Ok(record) if !record.descriptors.is_empty() => records.push(record),
                Ok(_) => tracing::warn!("Skipping {}: no stored descriptors", username),
                Err(e) => tracing::warn!("Skipping {}: {}", username, e),
            }
        }
        Ok(records)
    }

    fn get_record(&self, username: &str) -> Result<Option<EnrollmentRecord>> {
        let row = self.connection
            .query_row(
                "SELECT full_name, username, encoding FROM users WHERE username = ?",
                params![username],
                Self::row_to_record,
            )
            .optional()
            .map_err(read_error)?;
        row.map(Self::into_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(values: &[f32]) -> Descriptor {
        Descriptor::from_vec(values.to_vec())
    }

    #[test]
    fn new_username_creates_record() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        let outcome = store.enroll("alice", "Alice Liddell", &[descriptor(&[0.1, 0.2])]).unwrap();

        assert_eq!(outcome, EnrollOutcome { created: true, added: 1, total: 1 });
        let record = store.get_record("alice").unwrap().unwrap();
        assert_eq!(record.account, Account::new("alice", "Alice Liddell"));
        assert_eq!(record.descriptors, vec![descriptor(&[0.1, 0.2])]);
    }

    #[test]
    fn existing_username_appends_without_renaming() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.enroll("alice", "Alice", &[descriptor(&[1.0, 0.0])]).unwrap();
        let outcome = store
            .enroll("alice", "Someone Else", &[descriptor(&[0.0, 1.0]), descriptor(&[0.5, 0.5])])
            .unwrap();

        assert_eq!(outcome, EnrollOutcome { created: false, added: 2, total: 3 });
        let record = store.get_record("alice").unwrap().unwrap();
        assert_eq!(record.account.full_name, "Alice");
        assert_eq!(record.descriptors, vec![
            descriptor(&[1.0, 0.0]),
            descriptor(&[0.0, 1.0]),
            descriptor(&[0.5, 0.5]),
        ]);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.enroll("alice", "Alice", &[descriptor(&[1.0])]).unwrap();
        let outcome = store.enroll("Alice", "Alice", &[descriptor(&[2.0])]).unwrap();

        assert!(outcome.created);
        assert_eq!(store.all_records().unwrap().len(), 2);
    }

    #[test]
    fn empty_descriptor_list_is_rejected() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        let err = store.enroll("alice", "Alice", &[]).unwrap_err();
        assert!(matches!(err, FaceAppError::NoFaceDetected));
        assert!(store.get_record("alice").unwrap().is_none());
    }

    #[test]
    fn all_records_preserves_insertion_order_and_values() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        let precise = descriptor(&[0.1, -0.333_333_34, 1.0e-7, 123.456]);
        store.enroll("bob", "Bob", &[precise.clone()]).unwrap();
        store.enroll("alice", "Alice", &[descriptor(&[0.0; 4])]).unwrap();

        let records = store.all_records().unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.username()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
        assert_eq!(records[0].descriptors, vec![precise]);
    }

    #[test]
    fn empty_store_has_no_records() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        assert!(store.all_records().unwrap().is_empty());
        assert!(store.get_record("nobody").unwrap().is_none());
    }

    #[test]
    fn legacy_single_descriptor_rows_are_read_and_upgraded() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.connection.execute(
            "INSERT INTO users (full_name, username, encoding) VALUES (?, ?, ?)",
            params!["Carol", "carol", "[0.25, 0.5, 0.75]"],
        ).unwrap();

        let record = store.get_record("carol").unwrap().unwrap();
        assert_eq!(record.descriptors, vec![descriptor(&[0.25, 0.5, 0.75])]);

        store.enroll("carol", "Carol", &[descriptor(&[1.0, 1.0, 1.0])]).unwrap();
        let encoding: String = store.connection
            .query_row("SELECT encoding FROM users WHERE username = 'carol'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(encoding, "[[0.25,0.5,0.75],[1.0,1.0,1.0]]");
    }

    #[test]
    fn corrupt_rows_are_skipped_in_snapshot() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.enroll("alice", "Alice", &[descriptor(&[1.0])]).unwrap();
        store.connection.execute(
            "INSERT INTO users (full_name, username, encoding) VALUES ('Mallory', 'mallory', 'not json')",
            [],
        ).unwrap();
        store.connection.execute(
            "INSERT INTO users (full_name, username, encoding) VALUES ('Eve', 'eve', '[]')",
            [],
        ).unwrap();

        let records = store.all_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username(), "alice");
        assert!(store.get_record("mallory").is_err());
    }

    #[test]
    fn constraint_violations_map_to_write_conflict() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.enroll("alice", "Alice", &[descriptor(&[1.0])]).unwrap();
        let err = store.connection
            .execute(
                "INSERT INTO users (full_name, username, encoding) VALUES ('A', 'alice', '[]')",
                [],
            )
            .map_err(persistence_error)
            .unwrap_err();
        assert!(matches!(err, FaceAppError::PersistenceWriteConflict(_)));
    }

    #[test]
    fn unopenable_database_is_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("dir").join("faces.db");
        let err = SqliteEnrollmentStore::open(&path).err().unwrap();
        assert!(matches!(err, FaceAppError::PersistenceUnavailable(_)));
    }

    #[test]
    fn failed_select_is_a_read_error() {
        let store = SqliteEnrollmentStore::open_in_memory().unwrap();
        store.connection.execute_batch("DROP TABLE users").unwrap();

        let err = store.all_records().unwrap_err();
        assert!(matches!(err, FaceAppError::PersistenceRead(_)));
        assert!(matches!(store.get_record("alice"), Err(FaceAppError::PersistenceRead(_))));
    }
}
