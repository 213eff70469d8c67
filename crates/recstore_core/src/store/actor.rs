//! The single consumer thread that owns the driver, registry and caches.
//!
//! # Responsibility
//! - Execute queued actions one at a time, in submission order.
//! - Load a record type's table on first use (`ensure_managed`).
//! - Keep every cached table equal to its driver table after each action.
//!
//! # Invariants
//! - Size checks, key conflicts and key accessor checks are resolved before
//!   any mutation.
//! - A failed driver write leaves the cache as it was before the action.
//! - A failed first load faults the actor; every later action replies `Fault`.
//!
//! # See also
//! - `store::cache` for the per-type mirror.
//! - `store::blob` for blob actions, which bypass the cache.

use super::action::{Action, ErasedRecord, Message, RecordOp, Reply, TypeHandle};
use super::blob;
use super::cache::{RecordCache, TypeCache};
use crate::config::StoreConfig;
use crate::driver::{validate_table_name, Driver, DriverError, DriverResult};
use crate::error::{PayloadKind, StoreError, StoreResult};
use crate::schema::{FieldValue, SchemaError, SchemaRegistry};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

const ACTOR_THREAD_NAME: &str = "recstore-actor";

pub(crate) struct Actor {
    driver: Box<dyn Driver>,
    registry: SchemaRegistry,
    cache: RecordCache,
    config: StoreConfig,
    fault: Option<String>,
}

/// Starts the actor thread and returns the queue feeding it.
///
/// The join handle yields the driver's close result once a `Shutdown`
/// message has been processed.
pub(crate) fn spawn(
    driver: Box<dyn Driver>,
    config: StoreConfig,
) -> std::io::Result<(Sender<Message>, JoinHandle<DriverResult<()>>)> {
    let (sender, receiver) = mpsc::channel();
    let actor = Actor {
        driver,
        registry: SchemaRegistry::new(),
        cache: RecordCache::default(),
        config,
        fault: None,
    };
    let handle = thread::Builder::new()
        .name(ACTOR_THREAD_NAME.to_string())
        .spawn(move || actor.run(receiver))?;
    Ok((sender, handle))
}

impl Actor {
    fn run(mut self, receiver: Receiver<Message>) -> DriverResult<()> {
        debug!("event=actor_start module=store status=ok");
        let mut handled: u64 = 0;
        while let Ok(message) = receiver.recv() {
            match message {
                Message::Request { action, reply } => {
                    let outcome = self.execute(action);
                    handled += 1;
                    // The caller may have given up waiting; nothing to do then.
                    let _ = reply.send(outcome);
                }
                Message::Shutdown => break,
            }
        }
        info!("event=actor_stop module=store status=ok handled={handled}");
        self.driver.close()
    }

    fn execute(&mut self, action: Action) -> StoreResult<Reply> {
        if let Some(reason) = &self.fault {
            return Err(StoreError::Fault(reason.clone()));
        }

        match action {
            Action::Blob(op) => {
                blob::execute(self.driver.as_mut(), self.config.max_blob_bytes, op)
            }
            Action::Record { target, op } => {
                self.ensure_managed(&target)?;
                let op_name = op.name();
                let outcome = self.dispatch(&target, op);
                if let Err(err) = &outcome {
                    debug!(
                        "event=record_action module=store status=error op={op_name} type={} error={err}",
                        target.type_name
                    );
                }
                outcome
            }
        }
    }

    /// Loads the full table of `target` into the cache unless already loaded.
    fn ensure_managed(&mut self, target: &TypeHandle) -> StoreResult<()> {
        if self.cache.is_managed(target.type_id) {
            return Ok(());
        }

        let started_at = Instant::now();
        let descriptor = (target.describe)(&mut self.registry)?;
        let table = self.config.table_name(&descriptor.name);
        validate_table_name(&table)?;

        let rows = match self.driver.retrieve_all(&table) {
            Ok(rows) => rows,
            Err(err) => return Err(self.enter_fault(format!("cannot load table {table}: {err}"))),
        };
        let mut records = HashMap::with_capacity(rows.len());
        for (key, value) in rows {
            match (target.decode)(&value) {
                Ok(record) => {
                    records.insert(key, record);
                }
                Err(err) => {
                    return Err(
                        self.enter_fault(format!("cannot decode row `{key}` of {table}: {err}"))
                    )
                }
            }
        }

        let loaded = TypeCache::new(descriptor, table, records);
        info!(
            "event=type_managed module=store status=ok type={} table={} records={} duration_ms={}",
            loaded.name(),
            loaded.table(),
            loaded.len(),
            started_at.elapsed().as_millis()
        );
        self.cache.manage(target.type_id, loaded);
        Ok(())
    }

    fn enter_fault(&mut self, reason: String) -> StoreError {
        error!("event=store_fault module=store status=error reason={reason}");
        self.fault = Some(reason.clone());
        StoreError::Fault(reason)
    }

    fn dispatch(&mut self, target: &TypeHandle, op: RecordOp) -> StoreResult<Reply> {
        let max_bytes = self.config.max_record_bytes;
        let driver = self.driver.as_mut();
        let records = self.cache.get_mut(target.type_id).ok_or_else(|| {
            StoreError::Fault(format!("{} is not managed", target.type_name))
        })?;

        match op {
            RecordOp::Retrieve { key } => {
                Ok(Reply::Record(records.get(&key).map(|record| record.clone_record())))
            }
            RecordOp::RetrieveBy { attribute, value } => Ok(Reply::Record(
                records
                    .find_by(&attribute, &value)
                    .map(|record| record.clone_record()),
            )),
            RecordOp::RetrieveAll => Ok(Reply::Records(records.snapshot())),
            RecordOp::Exists { key } => Ok(Reply::Flag(records.contains(&key))),
            RecordOp::ExistsBy { attribute, value } => {
                Ok(Reply::Flag(records.find_by(&attribute, &value).is_some()))
            }
            RecordOp::NextId => Ok(Reply::Key(records.next_id())),
            RecordOp::Create { record } => create(driver, records, record, max_bytes),
            RecordOp::Update { record } => update(driver, records, record, max_bytes),
            RecordOp::Upsert { record } => upsert(driver, records, record, max_bytes),
            RecordOp::Remove { record } => {
                let key = record.record_key().to_string();
                remove(driver, records, &key)
            }
            RecordOp::RemoveByKey { key } => remove(driver, records, &key),
        }
    }
}

fn create(
    driver: &mut dyn Driver,
    records: &mut TypeCache,
    mut record: Box<dyn ErasedRecord>,
    max_bytes: usize,
) -> StoreResult<Reply> {
    if record.record_key().is_empty() {
        record.assign_key(records.next_id());
    }
    check_key_accessor(records, &*record)?;
    let key = record.record_key().to_string();
    if records.contains(&key) {
        return Err(StoreError::conflict(records.name(), key));
    }
    let value = encode_within(&*record, max_bytes)?;

    let table = records.table().to_string();
    records.insert(key.clone(), record);
    if let Err(err) = driver.create(&table, &key, &value) {
        records.remove(&key);
        return Err(persist_error(records.name(), &key, err));
    }
    Ok(Reply::Key(key))
}

fn update(
    driver: &mut dyn Driver,
    records: &mut TypeCache,
    record: Box<dyn ErasedRecord>,
    max_bytes: usize,
) -> StoreResult<Reply> {
    let key = record.record_key().to_string();
    if !records.contains(&key) {
        return Err(StoreError::not_found(records.name(), key));
    }
    check_key_accessor(records, &*record)?;
    let value = encode_within(&*record, max_bytes)?;

    driver
        .update(records.table(), &key, &value)
        .map_err(|err| persist_error(records.name(), &key, err))?;
    records.insert(key, record);
    Ok(Reply::Done)
}

fn upsert(
    driver: &mut dyn Driver,
    records: &mut TypeCache,
    mut record: Box<dyn ErasedRecord>,
    max_bytes: usize,
) -> StoreResult<Reply> {
    if record.record_key().is_empty() {
        record.assign_key(records.next_id());
    }
    check_key_accessor(records, &*record)?;
    let key = record.record_key().to_string();
    let value = encode_within(&*record, max_bytes)?;

    let table = records.table().to_string();
    let previous = records.insert(key.clone(), record);
    let persisted = if previous.is_some() {
        driver.update(&table, &key, &value)
    } else {
        driver.create(&table, &key, &value)
    };

    if let Err(err) = persisted {
        match previous {
            Some(previous) => {
                records.insert(key.clone(), previous);
            }
            None => {
                records.remove(&key);
            }
        }
        return Err(persist_error(records.name(), &key, err));
    }
    Ok(Reply::Key(key))
}

fn remove(driver: &mut dyn Driver, records: &mut TypeCache, key: &str) -> StoreResult<Reply> {
    if !records.contains(key) {
        return Err(StoreError::not_found(records.name(), key));
    }
    driver
        .remove(records.table(), key)
        .map_err(|err| persist_error(records.name(), key, err))?;
    records.remove(key);
    Ok(Reply::Done)
}

/// Rejects records whose `key()` is empty or differs from the value of the
/// declared key field.
fn check_key_accessor(records: &TypeCache, record: &dyn ErasedRecord) -> StoreResult<()> {
    let field = records.key_field();
    let key = record.record_key();
    match record.field_value(field) {
        Some(FieldValue::String(value)) if !key.is_empty() && value == key => Ok(()),
        _ => Err(SchemaError::KeyAccessorMismatch {
            type_name: records.name().to_string(),
            field: field.to_string(),
        }
        .into()),
    }
}

/// Serializes `record`, rejecting payloads longer than `max_bytes`.
fn encode_within(record: &dyn ErasedRecord, max_bytes: usize) -> StoreResult<String> {
    let value = record.encode()?;
    if value.len() > max_bytes {
        return Err(StoreError::PayloadTooLarge {
            kind: PayloadKind::Record,
            size: value.len(),
            max: max_bytes,
        });
    }
    Ok(value)
}

fn persist_error(entity: &str, key: &str, err: DriverError) -> StoreError {
    match err {
        DriverError::Duplicate => StoreError::conflict(entity, key),
        DriverError::NotFound => StoreError::not_found(entity, key),
        other => StoreError::Backend(other),
    }
}
