//! Embedded object persistence with a write-through record cache.
//!
//! A [`Store`] owns one actor thread that serializes every operation, keeps
//! an in-memory mirror of each record type it has touched, and writes every
//! mutation through to a pluggable [`Driver`].

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod schema;
pub mod store;

pub use config::{
    Backend, StoreConfig, CONTEXT_SEPARATOR, DEFAULT_MAX_BLOB_BYTES, DEFAULT_MAX_RECORD_BYTES,
};
pub use driver::{
    open_driver, Driver, DriverError, DriverResult, MemoryDriver, MemorySnapshot, RedbDriver,
    SqliteDriver, BLOBS_TABLE, MAX_KEY_LENGTH,
};
pub use error::{PayloadKind, StoreError, StoreResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use schema::{
    FieldKind, FieldValue, Record, RecordDescriptor, RecordSchema, SchemaError, SchemaRegistry,
};
pub use store::Store;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
