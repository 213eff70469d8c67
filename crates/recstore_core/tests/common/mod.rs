#![allow(dead_code)]

use recstore_core::{
    Driver, DriverError, DriverResult, FieldKind, FieldValue, MemoryDriver, Record, RecordSchema,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: i64,
}

impl Person {
    pub fn new(id: &str, name: &str, age: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            age,
        }
    }
}

impl Record for Person {
    fn type_name() -> &'static str {
        "Person"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .key("id")
            .field("id", FieldKind::String)
            .field("name", FieldKind::String)
            .field("age", FieldKind::Int)
            .update_only("age")
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(self.age.into()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub lines: Vec<String>,
}

impl Record for Invoice {
    fn type_name() -> &'static str {
        "Invoice"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .key("number")
            .field("number", FieldKind::String)
            .field("lines", FieldKind::Other)
    }

    fn key(&self) -> &str {
        &self.number
    }

    fn set_key(&mut self, key: String) {
        self.number = key;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "number" => Some(self.number.as_str().into()),
            _ => None,
        }
    }
}

/// Memory driver whose writes or loads can be switched to fail.
pub struct FlakyDriver {
    inner: MemoryDriver,
    fail_writes: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct FlakySwitches {
    pub fail_writes: Arc<AtomicBool>,
    pub fail_loads: Arc<AtomicBool>,
}

impl FlakySwitches {
    pub fn writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }
}

impl FlakyDriver {
    pub fn new(inner: MemoryDriver) -> (Self, FlakySwitches) {
        let switches = FlakySwitches {
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_loads: Arc::new(AtomicBool::new(false)),
        };
        let driver = Self {
            inner,
            fail_writes: Arc::clone(&switches.fail_writes),
            fail_loads: Arc::clone(&switches.fail_loads),
        };
        (driver, switches)
    }

    fn check_write(&self) -> DriverResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DriverError::Io(std::io::Error::other("injected write failure")));
        }
        Ok(())
    }
}

impl Driver for FlakyDriver {
    fn close(&mut self) -> DriverResult<()> {
        self.inner.close()
    }

    fn retrieve(&mut self, table: &str, key: &str) -> DriverResult<String> {
        self.inner.retrieve(table, key)
    }

    fn retrieve_all(&mut self, table: &str) -> DriverResult<HashMap<String, String>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(DriverError::Io(std::io::Error::other("injected load failure")));
        }
        self.inner.retrieve_all(table)
    }

    fn create(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        self.check_write()?;
        self.inner.create(table, key, value)
    }

    fn update(&mut self, table: &str, key: &str, value: &str) -> DriverResult<()> {
        self.check_write()?;
        self.inner.update(table, key, value)
    }

    fn remove(&mut self, table: &str, key: &str) -> DriverResult<()> {
        self.check_write()?;
        self.inner.remove(table, key)
    }

    fn blob_retrieve(&mut self, key: &str) -> DriverResult<Vec<u8>> {
        self.inner.blob_retrieve(key)
    }

    fn blob_create(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        self.check_write()?;
        self.inner.blob_create(key, bytes)
    }

    fn blob_update(&mut self, key: &str, bytes: &[u8]) -> DriverResult<()> {
        self.check_write()?;
        self.inner.blob_update(key, bytes)
    }

    fn blob_remove(&mut self, key: &str) -> DriverResult<()> {
        self.check_write()?;
        self.inner.blob_remove(key)
    }
}
