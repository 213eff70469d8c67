//! In-process driver backed by hash maps.
//!
//! Nothing survives the process; used for ephemeral stores and tests. A
//! `MemorySnapshot` shares the same tables so another thread can observe
//! exactly what the driver holds.

use super::{check_key_length, validate_table_name, Driver, DriverError, DriverResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryTables {
    tables: HashMap<String, HashMap<String, String>>,
    blobs: HashMap<String, Vec<u8>>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryDriver {
    inner: Arc<Mutex<MemoryTables>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view sharing this driver's tables.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            inner: Arc::clone(&self.inner),
        }
    }

    fn open_tables(&self) -> DriverResult<MutexGuard<'_, MemoryTables>> {
        let guard = lock(&self.inner);
        if guard.closed {
            return Err(DriverError::Closed);
        }
        Ok(guard)
    }
}

/// Observes the contents of a `MemoryDriver` from outside the store.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    inner: Arc<Mutex<MemoryTables>>,
}

impl MemorySnapshot {
    /// Current rows of `table`; empty when the table was never written.
    pub fn table(&self, table: &str) -> HashMap<String, String> {
        lock(&self.inner).tables.get(table).cloned().unwrap_or_default()
    }

    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.inner).blobs.get(key).cloned()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }
}

fn lock(inner: &Mutex<MemoryTables>) -> MutexGuard<'_, MemoryTables> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Driver for MemoryDriver {
    fn close(&mut self) -> DriverResult<()> {
        let mut tables = self.open_tables()?;
        tables.closed = true;
        Ok(())
    }

    fn retrieve(&mut self, table: &str, key: &str) -> DriverResult<String> {
        validate_table_name(table)?;
        let tables = self.open_tables()?;
        tables
            .tables
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
            .ok_or(DriverError::NotFound)
    }

    fn retrieve_all(&mut self, table: &str) -> DriverResult<HashMap<String, String>> {
        validate_table_name(table)?;
        let tables = self.open_tables()?;
        Ok(tables.tables.get(table).cloned().unwrap_or_default())
    }

    fn create(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        check_key_length(key)?;
        let mut tables = self.open_tables()?;
        let rows = tables.tables.entry(table.to_string()).or_default();
        if rows.contains_key(key) {
            return Err(DriverError::Duplicate);
        }
        rows.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn update(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        let mut tables = self.open_tables()?;
        let row = tables
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(key))
            .ok_or(DriverError::NotFound)?;
        *row = value.to_string();
        Ok(())
    }

    fn remove(&mut self, table: &str, key: &str) -> DriverResult<()> {
        validate_table_name(table)?;
        let mut tables = self.open_tables()?;
        tables
            .tables
            .get_mut(table)
            .and_then(|rows| rows.remove(key))
            .map(|_| ())
            .ok_or(DriverError::NotFound)
    }

    fn blob_retrieve(&mut self, key: &str) -> DriverResult<Vec<u8>> {
        let tables = self.open_tables()?;
        tables.blobs.get(key).cloned().ok_or(DriverError::NotFound)
    }

    fn blob_create(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        check_key_length(key)?;
        let mut tables = self.open_tables()?;
        if tables.blobs.contains_key(key) {
            return Err(DriverError::Duplicate);
        }
        tables.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn blob_update(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        let mut tables = self.open_tables()?;
        let blob = tables.blobs.get_mut(key).ok_or(DriverError::NotFound)?;
        *blob = bytes.to_vec();
        Ok(())
    }

    fn blob_remove(&mut self, key: &str) -> DriverResult<()> {
        let mut tables = self.open_tables()?;
        tables
            .blobs
            .remove(key)
            .map(|_| ())
            .ok_or(DriverError::NotFound)
    }
}
