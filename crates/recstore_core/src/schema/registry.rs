//! Memoized record descriptors.
//!
//! # Responsibility
//! - Validate a `Record` declaration the first time the type is used.
//! - Hand out the same immutable descriptor for every later use.
//!
//! # Invariants
//! - A descriptor is inserted at most once per `TypeId` and never mutated.
//! - A type name (and so a table) belongs to at most one `TypeId`.
//! - Failed validations are not memoized; the type stays unregistered.

use super::{assert_type_name, FieldKind, Record, SchemaError};
use log::debug;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Validated, immutable shape of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub name: String,
    pub key_field: String,
    pub fields: BTreeMap<String, FieldKind>,
    pub update_only: BTreeSet<String>,
}

impl RecordDescriptor {
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }
}

/// Type-keyed descriptor cache owned by a single store.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    descriptors: HashMap<TypeId, Arc<RecordDescriptor>>,
    owners: HashMap<String, TypeId>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `T`, validating and memoizing it on first use.
    ///
    /// # Errors
    /// - `SchemaError` when the key field is missing or not string-typed, a
    ///   field is declared twice, or an update-only field is undeclared.
    /// - `SchemaError::DuplicateTypeName` when another type already registered
    ///   the same `type_name()`.
    ///
    /// # Panics
    /// - When `T::type_name()` contains the context separator.
    pub fn describe<T: Record>(&mut self) -> Result<Arc<RecordDescriptor>, SchemaError> {
        let type_id = TypeId::of::<T>();
        if let Some(descriptor) = self.descriptors.get(&type_id) {
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = Arc::new(build_descriptor::<T>()?);
        if self.owners.contains_key(&descriptor.name) {
            return Err(SchemaError::DuplicateTypeName(descriptor.name.clone()));
        }
        debug!(
            "event=schema_register module=schema status=ok type={} fields={}",
            descriptor.name,
            descriptor.fields.len()
        );
        self.owners.insert(descriptor.name.clone(), type_id);
        self.descriptors.insert(type_id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

fn build_descriptor<T: Record>() -> Result<RecordDescriptor, SchemaError> {
    let name = T::type_name();
    if name.is_empty() {
        return Err(SchemaError::EmptyTypeName);
    }
    assert_type_name(name);

    let schema = T::schema();
    let mut fields = BTreeMap::new();
    for (field, kind) in schema.fields {
        if fields.insert(field.clone(), kind).is_some() {
            return Err(SchemaError::DuplicateField {
                type_name: name.to_string(),
                field,
            });
        }
    }

    let key_field = schema
        .key_field
        .filter(|field| fields.contains_key(field))
        .ok_or_else(|| SchemaError::MissingKeyField(name.to_string()))?;
    if fields.get(&key_field) != Some(&FieldKind::String) {
        return Err(SchemaError::KeyFieldNotString {
            type_name: name.to_string(),
            field: key_field,
        });
    }

    let mut update_only = BTreeSet::new();
    for field in schema.update_only {
        if !fields.contains_key(&field) {
            return Err(SchemaError::UnknownUpdateField {
                type_name: name.to_string(),
                field,
            });
        }
        update_only.insert(field);
    }

    Ok(RecordDescriptor {
        name: name.to_string(),
        key_field,
        fields,
        update_only,
    })
}
