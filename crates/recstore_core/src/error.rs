//! Store-level error taxonomy.
//!
//! # Responsibility
//! - Give every public operation one typed failure channel.
//! - Keep driver transport errors distinct from semantic outcomes
//!   (`NotFound`, `Conflict`) so callers can branch on them.
//!
//! # Invariants
//! - `PayloadTooLarge` is only produced before any cache or driver mutation.
//! - `Backend` errors are surfaced verbatim and never retried by the core.

use crate::driver::DriverError;
use crate::schema::SchemaError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Which size limit a payload was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Record,
    Blob,
}

impl Display for PayloadKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record => f.write_str("record"),
            Self::Blob => f.write_str("blob"),
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// The record type does not describe a valid record shape.
    Schema(SchemaError),
    /// No record or blob is stored under `key`.
    NotFound { entity: String, key: String },
    /// `key` is already in use.
    Conflict { entity: String, key: String },
    /// Serialized payload exceeds the configured maximum.
    PayloadTooLarge {
        kind: PayloadKind,
        size: usize,
        max: usize,
    },
    /// The store was never opened or has been closed.
    Uninitialized,
    /// Backing driver failure.
    Backend(DriverError),
    /// Record could not be encoded.
    Serialization(serde_json::Error),
    /// Unsupported URI or invalid configuration value.
    Config(String),
    /// The store can no longer uphold cache/driver consistency.
    Fault(String),
}

impl StoreError {
    pub(crate) fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub(crate) fn conflict(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Returns `true` for the absent-key outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for the key-in-use outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "invalid record schema: {err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} not found: `{key}`"),
            Self::Conflict { entity, key } => write!(f, "{entity} key already in use: `{key}`"),
            Self::PayloadTooLarge { kind, size, max } => write!(
                f,
                "serialized {kind} too large to be stored ({size} > {max} bytes)"
            ),
            Self::Uninitialized => write!(f, "store used outside an open/close bracket"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "cannot serialize record: {err}"),
            Self::Config(message) => write!(f, "invalid store configuration: {message}"),
            Self::Fault(message) => write!(f, "store faulted: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::PayloadTooLarge { .. }
            | Self::Uninitialized
            | Self::Config(_)
            | Self::Fault(_) => None,
        }
    }
}

impl From<SchemaError> for StoreError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<DriverError> for StoreError {
    fn from(value: DriverError) -> Self {
        Self::Backend(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
