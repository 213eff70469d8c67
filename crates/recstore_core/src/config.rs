//! Store configuration and URI scheme selection.
//!
//! # Responsibility
//! - Map an initialization URI onto a concrete backing driver.
//! - Carry the payload limits and optional context namespace.
//!
//! # Invariants
//! - `Backend` values only exist for supported schemes.
//! - Fields are public; `validate` runs again when a store opens, so a hand
//!   assembled context is held to the same rules as `with_context`.
//! - Limits are byte counts of the serialized payload, inclusive.

use crate::error::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Default maximum length of a serialized record.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 65_535;
/// Default maximum length of a blob payload.
pub const DEFAULT_MAX_BLOB_BYTES: usize = 65_535;
/// Separator between context and record type name in table names.
pub const CONTEXT_SEPARATOR: char = '.';

const SQLITE_SCHEME: &str = "sqlite3:";
const REDB_SCHEME: &str = "redb:";
const MEMORY_SCHEME: &str = "memory:";

static CONTEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{1,32}$").expect("valid context regex"));

/// Backing driver selected by the URI scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `sqlite3:<path>`; `sqlite3::memory:` opens a private in-memory database.
    Sqlite(PathBuf),
    /// `redb:<path>`
    Redb(PathBuf),
    /// `memory:`
    Memory,
}

impl Backend {
    /// Parses the scheme prefix of `uri`.
    ///
    /// # Errors
    /// - Returns `StoreError::Config` for unknown schemes or empty paths.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        let uri = uri.trim();
        if let Some(path) = uri.strip_prefix(SQLITE_SCHEME) {
            return Ok(Self::Sqlite(non_empty_path(uri, path)?));
        }
        if let Some(path) = uri.strip_prefix(REDB_SCHEME) {
            return Ok(Self::Redb(non_empty_path(uri, path)?));
        }
        if uri == MEMORY_SCHEME {
            return Ok(Self::Memory);
        }
        Err(StoreError::Config(format!("unsupported uri string: `{uri}`")))
    }

    /// Short scheme label used in log events.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite3",
            Self::Redb(_) => "redb",
            Self::Memory => "memory",
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(path) => write!(f, "{SQLITE_SCHEME}{}", path.display()),
            Self::Redb(path) => write!(f, "{REDB_SCHEME}{}", path.display()),
            Self::Memory => f.write_str(MEMORY_SCHEME),
        }
    }
}

/// Everything needed to open a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: Backend,
    pub context: Option<String>,
    pub max_record_bytes: usize,
    pub max_blob_bytes: usize,
}

impl StoreConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            context: None,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }

    /// Builds a default configuration from an initialization URI.
    pub fn from_uri(uri: &str) -> StoreResult<Self> {
        Backend::parse(uri).map(Self::new)
    }

    /// Namespaces every record table under `context`.
    ///
    /// # Errors
    /// - Returns `StoreError::Config` when `context` is not 1-32 characters
    ///   of `[A-Za-z0-9_]`.
    pub fn with_context(mut self, context: impl Into<String>) -> StoreResult<Self> {
        let context = context.into();
        check_context(&context)?;
        self.context = Some(context);
        Ok(self)
    }

    /// Checks the context namespace of a possibly hand-built configuration.
    pub fn validate(&self) -> StoreResult<()> {
        match &self.context {
            Some(context) => check_context(context),
            None => Ok(()),
        }
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    pub fn with_max_blob_bytes(mut self, max: usize) -> Self {
        self.max_blob_bytes = max;
        self
    }

    /// Table name for a record type under the configured context.
    pub fn table_name(&self, type_name: &str) -> String {
        match &self.context {
            Some(context) => format!("{context}{CONTEXT_SEPARATOR}{type_name}"),
            None => type_name.to_string(),
        }
    }
}

fn check_context(context: &str) -> StoreResult<()> {
    if CONTEXT_RE.is_match(context) {
        Ok(())
    } else {
        Err(StoreError::Config(format!(
            "context `{context}` must match [A-Za-z0-9_]{{1,32}}"
        )))
    }
}

fn non_empty_path(uri: &str, path: &str) -> StoreResult<PathBuf> {
    if path.is_empty() {
        return Err(StoreError::Config(format!("uri `{uri}` has an empty path")));
    }
    Ok(PathBuf::from(path))
}
