//! Messages exchanged between `Store` handles and the actor.
//!
//! Records cross the channel type-erased as `Box<dyn ErasedRecord>`; the
//! `TypeHandle` carries the monomorphized functions the actor needs to
//! describe and decode a type it only knows by `TypeId`.

use crate::error::StoreResult;
use crate::schema::{FieldValue, Record, RecordDescriptor, SchemaError, SchemaRegistry};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Object-safe view of a `Record`.
pub(crate) trait ErasedRecord: Send {
    fn record_key(&self) -> &str;
    fn assign_key(&mut self, key: String);
    fn field_value(&self, name: &str) -> Option<FieldValue>;
    fn encode(&self) -> serde_json::Result<String>;
    fn clone_record(&self) -> Box<dyn ErasedRecord>;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Record> ErasedRecord for T {
    fn record_key(&self) -> &str {
        Record::key(self)
    }

    fn assign_key(&mut self, key: String) {
        Record::set_key(self, key);
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        Record::field(self, name)
    }

    fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn clone_record(&self) -> Box<dyn ErasedRecord> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Recovers the concrete record from an erased box.
pub(crate) fn downcast<T: Record>(record: Box<dyn ErasedRecord>) -> Option<T> {
    record.into_any().downcast::<T>().ok().map(|boxed| *boxed)
}

type DescribeFn = fn(&mut SchemaRegistry) -> Result<Arc<RecordDescriptor>, SchemaError>;
type DecodeFn = fn(&str) -> serde_json::Result<Box<dyn ErasedRecord>>;

/// Identity of a record type plus the functions to describe and decode it.
#[derive(Clone, Copy)]
pub(crate) struct TypeHandle {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub describe: DescribeFn,
    pub decode: DecodeFn,
}

impl TypeHandle {
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            describe: SchemaRegistry::describe::<T>,
            decode: decode_record::<T>,
        }
    }
}

fn decode_record<T: Record>(value: &str) -> serde_json::Result<Box<dyn ErasedRecord>> {
    let record: T = serde_json::from_str(value)?;
    Ok(Box::new(record))
}

pub(crate) enum RecordOp {
    Retrieve { key: String },
    RetrieveBy { attribute: String, value: FieldValue },
    RetrieveAll,
    Exists { key: String },
    ExistsBy { attribute: String, value: FieldValue },
    NextId,
    Create { record: Box<dyn ErasedRecord> },
    Update { record: Box<dyn ErasedRecord> },
    Upsert { record: Box<dyn ErasedRecord> },
    Remove { record: Box<dyn ErasedRecord> },
    RemoveByKey { key: String },
}

impl RecordOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Retrieve { .. } => "retrieve",
            Self::RetrieveBy { .. } => "retrieve_by",
            Self::RetrieveAll => "retrieve_all",
            Self::Exists { .. } => "exists",
            Self::ExistsBy { .. } => "exists_by",
            Self::NextId => "next_id",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Upsert { .. } => "upsert",
            Self::Remove { .. } => "remove",
            Self::RemoveByKey { .. } => "remove_by_key",
        }
    }
}

pub(crate) enum BlobOp {
    Retrieve { key: String },
    Create { key: String, bytes: Vec<u8> },
    Update { key: String, bytes: Vec<u8> },
    Remove { key: String },
}

pub(crate) enum Action {
    Record { target: TypeHandle, op: RecordOp },
    Blob(BlobOp),
}

pub(crate) enum Reply {
    Record(Option<Box<dyn ErasedRecord>>),
    Records(HashMap<String, Box<dyn ErasedRecord>>),
    Flag(bool),
    Key(String),
    Blob(Option<Vec<u8>>),
    Done,
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Records(_) => "records",
            Self::Flag(_) => "flag",
            Self::Key(_) => "key",
            Self::Blob(_) => "blob",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(flag) => write!(f, "Reply::Flag({flag})"),
            Self::Key(key) => write!(f, "Reply::Key({key:?})"),
            Self::Records(records) => write!(f, "Reply::Records(len={})", records.len()),
            other => write!(f, "Reply::{}", other.kind()),
        }
    }
}

pub(crate) enum Message {
    Request {
        action: Action,
        reply: Sender<StoreResult<Reply>>,
    },
    /// Processed after every earlier request; ends the actor loop.
    Shutdown,
}
