//! redb embedded driver.
//!
//! Each record table maps to one redb table of `&str -> &str`; blobs live in
//! a `&str -> &[u8]` table. Every mutation commits its own write transaction
//! and aborts it on any failure, so a failed call leaves the file unchanged.

use super::{check_key_length, validate_table_name, Driver, DriverError, DriverResult, BLOBS_TABLE};
use log::info;
use redb::{Database, ReadableTable, TableDefinition, TableError, WriteTransaction};
use std::collections::HashMap;
use std::path::Path;

const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new(BLOBS_TABLE);

pub struct RedbDriver {
    db: Option<Database>,
}

impl RedbDriver {
    /// Creates or opens the database file at `path`.
    pub fn open(path: &Path) -> DriverResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        write_txn.open_table(BLOBS)?;
        write_txn.commit()?;

        info!(
            "event=db_open module=driver status=ok backend=redb path={}",
            path.display()
        );
        Ok(Self { db: Some(db) })
    }

    fn db(&self) -> DriverResult<&Database> {
        self.db.as_ref().ok_or(DriverError::Closed)
    }

    /// Runs `op` in one write transaction, committing only on success.
    fn write<R>(&self, op: impl FnOnce(&WriteTransaction) -> DriverResult<R>) -> DriverResult<R> {
        let txn = self.db()?.begin_write()?;
        match op(&txn) {
            Ok(output) => {
                txn.commit()?;
                Ok(output)
            }
            Err(err) => {
                txn.abort()?;
                Err(err)
            }
        }
    }
}

fn records(table: &str) -> TableDefinition<'_, &'static str, &'static str> {
    TableDefinition::new(table)
}

impl Driver for RedbDriver {
    fn close(&mut self) -> DriverResult<()> {
        self.db.take().map(drop).ok_or(DriverError::Closed)
    }

    fn retrieve(&mut self, table: &str, key: &str) -> DriverResult<String> {
        validate_table_name(table)?;
        let read_txn = self.db()?.begin_read()?;
        let rows = match read_txn.open_table(records(table)) {
            Ok(rows) => rows,
            Err(TableError::TableDoesNotExist(_)) => return Err(DriverError::NotFound),
            Err(err) => return Err(err.into()),
        };
        let value = rows.get(key)?.map(|guard| guard.value().to_string());
        value.ok_or(DriverError::NotFound)
    }

    fn retrieve_all(&mut self, table: &str) -> DriverResult<HashMap<String, String>> {
        validate_table_name(table)?;
        let read_txn = self.db()?.begin_read()?;
        let rows = match read_txn.open_table(records(table)) {
            Ok(rows) => rows,
            Err(TableError::TableDoesNotExist(_)) => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };
        let mut output = HashMap::new();
        for entry in rows.iter()? {
            let (key, value) = entry?;
            output.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(output)
    }

    fn create(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        check_key_length(key)?;
        self.write(|txn| {
            let mut rows = txn.open_table(records(table))?;
            if rows.get(key)?.is_some() {
                return Err(DriverError::Duplicate);
            }
            rows.insert(key, value)?;
            Ok(())
        })
    }

    fn update(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        self.write(|txn| {
            let mut rows = txn.open_table(records(table))?;
            if rows.get(key)?.is_none() {
                return Err(DriverError::NotFound);
            }
            rows.insert(key, value)?;
            Ok(())
        })
    }

    fn remove(&mut self, table: &str, key: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        self.write(|txn| {
            let mut rows = txn.open_table(records(table))?;
            let removed = rows.remove(key)?.is_some();
            if !removed {
                return Err(DriverError::NotFound);
            }
            Ok(())
        })
    }

    fn blob_retrieve(&mut self, key: &str) -> DriverResult<Vec<u8>> {
        let read_txn = self.db()?.begin_read()?;
        let blobs = read_txn.open_table(BLOBS)?;
        let bytes = blobs.get(key)?.map(|guard| guard.value().to_vec());
        bytes.ok_or(DriverError::NotFound)
    }

    fn blob_create(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        check_key_length(key)?;
        self.write(|txn| {
            let mut blobs = txn.open_table(BLOBS)?;
            if blobs.get(key)?.is_some() {
                return Err(DriverError::Duplicate);
            }
            blobs.insert(key, bytes)?;
            Ok(())
        })
    }

    fn blob_update(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        self.write(|txn| {
            let mut blobs = txn.open_table(BLOBS)?;
            if blobs.get(key)?.is_none() {
                return Err(DriverError::NotFound);
            }
            blobs.insert(key, bytes)?;
            Ok(())
        })
    }

    fn blob_remove(&mut self, key: &str) -> DriverResult<()> {
        self.write(|txn| {
            let mut blobs = txn.open_table(BLOBS)?;
            let removed = blobs.remove(key)?.is_some();
            if !removed {
                return Err(DriverError::NotFound);
            }
            Ok(())
        })
    }
}

impl From<redb::DatabaseError> for DriverError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Redb(value.into())
    }
}

impl From<redb::TransactionError> for DriverError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Redb(value.into())
    }
}

impl From<redb::TableError> for DriverError {
    fn from(value: redb::TableError) -> Self {
        Self::Redb(value.into())
    }
}

impl From<redb::StorageError> for DriverError {
    fn from(value: redb::StorageError) -> Self {
        Self::Redb(value.into())
    }
}

impl From<redb::CommitError> for DriverError {
    fn from(value: redb::CommitError) -> Self {
        Self::Redb(value.into())
    }
}
