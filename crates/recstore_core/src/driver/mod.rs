//! Backing store driver contract and backend selection.
//!
//! # Responsibility
//! - Define the key/value persistence surface the store actor consumes.
//! - Open the concrete driver selected by a `Backend`.
//!
//! # Invariants
//! - Values are opaque serialized records; drivers never inspect them.
//! - `NotFound` from update/remove means zero rows were affected.
//! - Drivers are owned by exactly one thread and need no internal locking.
//!
//! # See also
//! - `store::actor` for the only caller.

use crate::config::Backend;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod redb_store;
pub mod sqlite;

pub use memory::{MemoryDriver, MemorySnapshot};
pub use redb_store::RedbDriver;
pub use sqlite::SqliteDriver;

/// Name of the dedicated blob table.
pub const BLOBS_TABLE: &str = "blobs";
/// Longest key accepted by the drivers, in bytes.
pub const MAX_KEY_LENGTH: usize = 512;

static TABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]{1,40}$").expect("valid table name regex"));

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug)]
pub enum DriverError {
    /// No row matched the key (zero rows affected for mutations).
    NotFound,
    /// A row with the key already exists.
    Duplicate,
    InvalidTableName(String),
    KeyTooLong { len: usize, max: usize },
    UnsupportedSchemaVersion { db_version: u32, latest_supported: u32 },
    Sqlite(rusqlite::Error),
    Redb(redb::Error),
    Io(std::io::Error),
    /// The driver was already closed.
    Closed,
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no rows matched the key"),
            Self::Duplicate => write!(f, "a row with the same key already exists"),
            Self::InvalidTableName(name) => {
                write!(f, "table name `{name}` could be a SQL injection attack")
            }
            Self::KeyTooLong { len, max } => write!(f, "key too long ({len} > {max})"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Redb(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "driver is closed"),
        }
    }
}

impl Error for DriverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Redb(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::NotFound
            | Self::Duplicate
            | Self::InvalidTableName(_)
            | Self::KeyTooLong { .. }
            | Self::UnsupportedSchemaVersion { .. }
            | Self::Closed => None,
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DriverError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Durable per-table key/value persistence plus one blob table.
pub trait Driver: Send {
    /// Releases the underlying connection. Later calls return `Closed`.
    fn close(&mut self) -> DriverResult<()>;

    fn retrieve(&mut self, table: &str, key: &str) -> DriverResult<String>;

    /// Every row of `table`; an absent table yields an empty map.
    fn retrieve_all(&mut self, table: &str) -> DriverResult<HashMap<String, String>>;

    /// Fails with `Duplicate` when `key` already exists.
    fn create(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()>;

    fn update(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()>;

    fn remove(&mut self, table: &str, key: &str) -> DriverResult<()>;

    fn blob_retrieve(&mut self, key: &str) -> DriverResult<Vec<u8>>;

    /// Fails with `Duplicate` when `key` already exists.
    fn blob_create(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()>;

    /// Fails with `NotFound` exactly when zero rows were affected.
    fn blob_update(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()>;

    /// Fails with `NotFound` exactly when zero rows were affected.
    fn blob_remove(&mut self, key: &str) -> DriverResult<()>;
}

/// Opens the driver for `backend`.
pub fn open_driver(backend: &Backend) -> DriverResult<Box<dyn Driver>> {
    match backend {
        Backend::Sqlite(path) => Ok(Box::new(SqliteDriver::open(path)?)),
        Backend::Redb(path) => Ok(Box::new(RedbDriver::open(path)?)),
        Backend::Memory => Ok(Box::new(MemoryDriver::new())),
    }
}

/// Rejects table names that could smuggle SQL or collide with the blob table.
pub fn validate_table_name(table: &str) -> DriverResult<()> {
    if !TABLE_NAME_RE.is_match(table) || table == BLOBS_TABLE {
        return Err(DriverError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

pub(crate) fn check_key_length(key: &str) -> DriverResult<()> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(DriverError::KeyTooLong {
            len: key.len(),
            max: MAX_KEY_LENGTH,
        });
    }
    Ok(())
}
