//! SQLite driver.
//!
//! # Responsibility
//! - Persist each record table as `(id VARCHAR(512) PRIMARY KEY, value TEXT)`.
//! - Persist blobs in the fixed `blobs` table created by migrations.
//!
//! # Invariants
//! - A table name is validated before it is ever formatted into SQL.
//! - Zero affected rows on update/remove is reported as `NotFound`.

use super::{check_key_length, validate_table_name, Driver, DriverError, DriverResult, BLOBS_TABLE};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub mod migrations;
mod open;

pub use open::open_connection;

pub struct SqliteDriver {
    conn: Option<Connection>,
    handled_tables: HashSet<String>,
}

impl SqliteDriver {
    pub fn open(path: &Path) -> DriverResult<Self> {
        Ok(Self::from_connection(open_connection(path)?))
    }

    /// Wraps an already bootstrapped connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            handled_tables: HashSet::new(),
        }
    }

    fn conn(&self) -> DriverResult<&Connection> {
        self.conn.as_ref().ok_or(DriverError::Closed)
    }

    /// Validates `table` and creates it the first time it is referenced.
    fn ensure_table(&mut self, table: &str) -> DriverResult<&Connection> {
        if !self.handled_tables.contains(table) {
            validate_table_name(table)?;
            self.conn()?.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{table}\" (
                    id VARCHAR({max}) PRIMARY KEY,
                    value TEXT NOT NULL
                );",
                max = super::MAX_KEY_LENGTH
            ))?;
            debug!("event=table_ready module=driver status=ok backend=sqlite3 table={table}");
            self.handled_tables.insert(table.to_string());
        }
        self.conn()
    }
}

impl Driver for SqliteDriver {
    fn close(&mut self) -> DriverResult<()> {
        let conn = self.conn.take().ok_or(DriverError::Closed)?;
        self.handled_tables.clear();
        conn.close().map_err(|(_, err)| DriverError::Sqlite(err))
    }

    fn retrieve(&mut self, table: &str, key: &str) -> DriverResult<String> {
        let conn = self.ensure_table(table)?;
        let mut stmt = conn.prepare_cached(&format!("SELECT value FROM \"{table}\" WHERE id = ?1"))?;
        stmt.query_row([key], |row| row.get::<_, String>(0))
            .optional()?
            .ok_or(DriverError::NotFound)
    }

    fn retrieve_all(&mut self, table: &str) -> DriverResult<HashMap<String, String>> {
        let conn = self.ensure_table(table)?;
        let mut stmt = conn.prepare_cached(&format!("SELECT id, value FROM \"{table}\""))?;
        let mut rows = stmt.query([])?;
        let mut output = HashMap::new();
        while let Some(row) = rows.next()? {
            output.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        }
        Ok(output)
    }

    fn create(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        check_key_length(key)?;
        let conn = self.ensure_table(table)?;
        let mut stmt =
            conn.prepare_cached(&format!("INSERT INTO \"{table}\" (id, value) VALUES (?1, ?2)"))?;
        stmt.execute(params![key, value]).map_err(map_insert_error)?;
        Ok(())
    }

    fn update(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        let conn = self.ensure_table(table)?;
        let mut stmt =
            conn.prepare_cached(&format!("UPDATE \"{table}\" SET value = ?1 WHERE id = ?2"))?;
        expect_one_row(stmt.execute(params![value, key])?)
    }

    fn remove(&mut self, table: &str, key: &str) -> DriverResult<()> {
        let conn = self.ensure_table(table)?;
        let mut stmt = conn.prepare_cached(&format!("DELETE FROM \"{table}\" WHERE id = ?1"))?;
        expect_one_row(stmt.execute([key])?)
    }

    fn blob_retrieve(&mut self, key: &str) -> DriverResult<Vec<u8>> {
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("SELECT value FROM {BLOBS_TABLE} WHERE id = ?1"))?;
        stmt.query_row([key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?
            .ok_or(DriverError::NotFound)
    }

    fn blob_create(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        check_key_length(key)?;
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("INSERT INTO {BLOBS_TABLE} (id, value) VALUES (?1, ?2)"))?;
        stmt.execute(params![key, bytes]).map_err(map_insert_error)?;
        Ok(())
    }

    fn blob_update(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("UPDATE {BLOBS_TABLE} SET value = ?1 WHERE id = ?2"))?;
        expect_one_row(stmt.execute(params![bytes, key])?)
    }

    fn blob_remove(&mut self, key: &str) -> DriverResult<()> {
        let mut stmt = self
            .conn()?
            .prepare_cached(&format!("DELETE FROM {BLOBS_TABLE} WHERE id = ?1"))?;
        expect_one_row(stmt.execute([key])?)
    }
}

fn expect_one_row(changed: usize) -> DriverResult<()> {
    if changed == 0 {
        return Err(DriverError::NotFound);
    }
    Ok(())
}

fn map_insert_error(err: rusqlite::Error) -> DriverError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => DriverError::Duplicate,
        _ => DriverError::Sqlite(err),
    }
}
