//! Record shape declaration.
//!
//! # Responsibility
//! - Define the `Record` contract every stored type implements.
//! - Describe fields and the designated key field without runtime reflection.
//!
//! # Invariants
//! - The key field is declared and string-typed.
//! - A record type name never contains the context separator.
//!
//! # See also
//! - `schema::registry` for validation and memoization.

use crate::config::CONTEXT_SEPARATOR;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod registry;

pub use registry::{RecordDescriptor, SchemaRegistry};

/// A flat struct persisted as one row keyed by a string attribute.
///
/// `key`, `set_key` and `field(<key field>)` must all address the field named
/// by `schema().key_field`. Writes of a record whose `key()` disagrees with
/// that field fail with `SchemaError::KeyAccessorMismatch`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Symbolic name used to derive the backing table name.
    fn type_name() -> &'static str;

    /// Declared field layout.
    fn schema() -> RecordSchema;

    fn key(&self) -> &str;

    fn set_key(&mut self, key: String);

    /// Current value of a declared attribute, used by attribute lookups.
    ///
    /// Returns `None` for unknown attributes or attributes whose kind is
    /// `FieldKind::Other`.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Declared type of a record attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    String,
    Int,
    UInt,
    Float,
    Bool,
    Bytes,
    /// Nested or composite value; never matched by attribute lookups.
    Other,
}

/// Runtime value of a record attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::String(_) => FieldKind::String,
            Self::Int(_) => FieldKind::Int,
            Self::UInt(_) => FieldKind::UInt,
            Self::Float(_) => FieldKind::Float,
            Self::Bool(_) => FieldKind::Bool,
            Self::Bytes(_) => FieldKind::Bytes,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Field layout declared by a `Record` implementation.
///
/// Built with chained calls:
///
/// ```
/// use recstore_core::{FieldKind, RecordSchema};
///
/// let schema = RecordSchema::new()
///     .key("id")
///     .field("id", FieldKind::String)
///     .field("visits", FieldKind::Int)
///     .update_only("visits");
/// assert_eq!(schema.key_field.as_deref(), Some("id"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSchema {
    pub key_field: Option<String>,
    pub fields: Vec<(String, FieldKind)>,
    pub update_only: Vec<String>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as the key attribute.
    pub fn key(mut self, name: &str) -> Self {
        self.key_field = Some(name.to_string());
        self
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push((name.to_string(), kind));
        self
    }

    /// Reserved for partial-update semantics; recorded but not interpreted.
    pub fn update_only(mut self, name: &str) -> Self {
        self.update_only.push(name.to_string());
        self
    }
}

/// Invalid record declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyTypeName,
    MissingKeyField(String),
    KeyFieldNotString { type_name: String, field: String },
    DuplicateField { type_name: String, field: String },
    UnknownUpdateField { type_name: String, field: String },
    /// Another record type already uses this name.
    DuplicateTypeName(String),
    /// `Record::key` disagrees with the declared key field.
    KeyAccessorMismatch { type_name: String, field: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTypeName => write!(f, "record type name cannot be empty"),
            Self::MissingKeyField(type_name) => {
                write!(f, "{type_name} has no declared key field")
            }
            Self::KeyFieldNotString { type_name, field } => {
                write!(f, "{type_name} key field `{field}` is not a string")
            }
            Self::DuplicateField { type_name, field } => {
                write!(f, "{type_name} declares field `{field}` more than once")
            }
            Self::UnknownUpdateField { type_name, field } => {
                write!(f, "{type_name} marks undeclared field `{field}` as update-only")
            }
            Self::DuplicateTypeName(type_name) => {
                write!(f, "record type name `{type_name}` is used by another type")
            }
            Self::KeyAccessorMismatch { type_name, field } => write!(
                f,
                "{type_name} key() does not return the declared key field `{field}`"
            ),
        }
    }
}

impl Error for SchemaError {}

/// Panics when `type_name` carries the context separator.
///
/// A separator inside a type name would make table names ambiguous across
/// contexts; this is an authoring defect and is not recoverable.
pub fn assert_type_name(type_name: &str) {
    assert!(
        !type_name.contains(CONTEXT_SEPARATOR),
        "record type name `{type_name}` contains the reserved context separator `{CONTEXT_SEPARATOR}`"
    );
}
