//! In-memory mirror of every managed record table.
//!
//! # Invariants
//! - Cached records are private boxes; nothing outside the actor aliases them.
//! - A type appears in `RecordCache` only after its full table was loaded.
//! - Lookups by attribute and `next_id` are linear in the type's record count.

use super::action::ErasedRecord;
use crate::schema::{FieldKind, FieldValue, RecordDescriptor};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Cached records of one record type.
pub(crate) struct TypeCache {
    descriptor: Arc<RecordDescriptor>,
    table: String,
    records: HashMap<String, Box<dyn ErasedRecord>>,
}

impl TypeCache {
    pub fn new(
        descriptor: Arc<RecordDescriptor>,
        table: String,
        records: HashMap<String, Box<dyn ErasedRecord>>,
    ) -> Self {
        Self {
            descriptor,
            table,
            records,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn key_field(&self) -> &str {
        &self.descriptor.key_field
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&dyn ErasedRecord> {
        self.records.get(key).map(|record| &**record)
    }

    /// First record whose `attribute` equals `value`.
    ///
    /// Undeclared attributes, `FieldKind::Other` attributes and values of the
    /// wrong kind never match. Iteration order is unspecified.
    pub fn find_by(&self, attribute: &str, value: &FieldValue) -> Option<&dyn ErasedRecord> {
        let declared = self.descriptor.field_kind(attribute)?;
        if declared == FieldKind::Other || declared != value.kind() {
            return None;
        }
        self.records
            .values()
            .find(|record| record.field_value(attribute).as_ref() == Some(value))
            .map(|record| &**record)
    }

    /// Smallest non-negative integer, as a string, not used as a key.
    pub fn next_id(&self) -> String {
        let mut candidate: u64 = 0;
        loop {
            let key = candidate.to_string();
            if !self.records.contains_key(&key) {
                return key;
            }
            candidate += 1;
        }
    }

    /// Stores `record` under `key`, returning the replaced record.
    pub fn insert(
        &mut self,
        key: String,
        record: Box<dyn ErasedRecord>,
    ) -> Option<Box<dyn ErasedRecord>> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn ErasedRecord>> {
        self.records.remove(key)
    }

    /// Independent copies of every cached record.
    pub fn snapshot(&self) -> HashMap<String, Box<dyn ErasedRecord>> {
        self.records
            .iter()
            .map(|(key, record)| (key.clone(), record.clone_record()))
            .collect()
    }
}

/// Per-type caches keyed by the record's `TypeId`.
#[derive(Default)]
pub(crate) struct RecordCache {
    types: HashMap<TypeId, TypeCache>,
}

impl RecordCache {
    pub fn is_managed(&self, type_id: TypeId) -> bool {
        self.types.contains_key(&type_id)
    }

    pub fn manage(&mut self, type_id: TypeId, cache: TypeCache) {
        self.types.insert(type_id, cache);
    }

    pub fn get_mut(&mut self, type_id: TypeId) -> Option<&mut TypeCache> {
        self.types.get_mut(&type_id)
    }
}
