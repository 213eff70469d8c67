//! Public store handle and open/close lifecycle.
//!
//! # Responsibility
//! - Turn typed API calls into actions and queue them for the actor.
//! - Own the lifecycle: `open` starts the actor, `close` drains and stops it.
//!
//! # Invariants
//! - Every action is executed by the single actor thread, in queue order.
//! - Records cross the queue as clones; callers never alias cached state.
//! - Any call outside an open/close bracket returns `StoreError::Uninitialized`.
//!
//! # See also
//! - `store::actor` for action semantics.

pub(crate) mod action;
mod actor;
mod blob;
mod cache;

use crate::config::StoreConfig;
use crate::driver::{open_driver, Driver, DriverError, DriverResult};
use crate::error::{StoreError, StoreResult};
use crate::schema::{assert_type_name, FieldValue, Record};
use action::{downcast, Action, BlobOp, ErasedRecord, Message, RecordOp, Reply, TypeHandle};
use log::{error, info};
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

/// Handle to an open store.
///
/// Clones share the same actor; closing any clone closes the store for all
/// of them.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    state: Mutex<Option<Running>>,
}

struct Running {
    sender: Sender<Message>,
    actor: JoinHandle<DriverResult<()>>,
}

impl Running {
    /// Queues `Shutdown` behind every pending action and waits for the actor.
    fn shutdown(self) -> StoreResult<()> {
        // A send error means the actor already exited; join reports why.
        let _ = self.sender.send(Message::Shutdown);
        match self.actor.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(StoreError::Backend(err)),
            Err(_) => Err(StoreError::Fault("actor thread panicked".to_string())),
        }
    }
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self) -> StoreResult<Sender<Message>> {
        self.state()
            .as_ref()
            .map(|running| running.sender.clone())
            .ok_or(StoreError::Uninitialized)
    }

    /// Error for a request whose reply channel was dropped.
    fn lost_reply(&self) -> StoreError {
        if self.state().is_some() {
            StoreError::Fault("actor thread terminated".to_string())
        } else {
            StoreError::Uninitialized
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let running = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(running) = running {
            if let Err(err) = running.shutdown() {
                error!("event=store_close module=store status=error trigger=drop error={err}");
            }
        }
    }
}

impl Store {
    /// Opens a store from an initialization URI.
    ///
    /// Supported schemes: `sqlite3:<path>`, `redb:<path>` and `memory:`.
    ///
    /// # Errors
    /// - `StoreError::Config` for unsupported schemes.
    /// - `StoreError::Backend` when the backing database cannot be opened.
    pub fn open(uri: &str) -> StoreResult<Self> {
        Self::open_with(StoreConfig::from_uri(uri)?)
    }

    pub fn open_with(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let started_at = Instant::now();
        let scheme = config.backend.scheme();
        info!("event=store_open module=store status=start backend={scheme}");

        let driver = open_driver(&config.backend).map_err(|err| {
            error!(
                "event=store_open module=store status=error backend={scheme} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            StoreError::Backend(err)
        })?;
        let store = Self::with_driver(driver, config)?;

        info!(
            "event=store_open module=store status=ok backend={scheme} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(store)
    }

    /// Starts a store over an already opened driver.
    ///
    /// # Errors
    /// - `StoreError::Config` when `config` carries an invalid context.
    pub fn with_driver(driver: Box<dyn Driver>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let (sender, actor) = actor::spawn(driver, config.clone())
            .map_err(|err| StoreError::Backend(DriverError::Io(err)))?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                state: Mutex::new(Some(Running { sender, actor })),
            }),
        })
    }

    /// Waits for every queued action, stops the actor and closes the driver.
    ///
    /// # Errors
    /// - `StoreError::Uninitialized` when the store is already closed.
    /// - `StoreError::Backend` when the driver fails to close.
    pub fn close(&self) -> StoreResult<()> {
        let running = self
            .inner
            .state()
            .take()
            .ok_or(StoreError::Uninitialized)?;

        let started_at = Instant::now();
        let outcome = running.shutdown();
        match &outcome {
            Ok(()) => info!(
                "event=store_close module=store status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!("event=store_close module=store status=error error={err}"),
        }
        outcome
    }

    pub fn is_open(&self) -> bool {
        self.inner.state().is_some()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Copy of the record stored under `key`, or `None`.
    pub fn retrieve<T: Record>(&self, key: &str) -> StoreResult<Option<T>> {
        let reply = self.record_action::<T>(RecordOp::Retrieve {
            key: key.to_string(),
        })?;
        match reply {
            Reply::Record(record) => record.map(into_typed::<T>).transpose(),
            other => Err(unexpected(other)),
        }
    }

    /// First record whose `attribute` equals `value`.
    ///
    /// Undeclared attributes and values of a different kind than the declared
    /// field never match. When several records match, which one is returned is
    /// unspecified.
    pub fn retrieve_by<T: Record>(
        &self,
        attribute: &str,
        value: impl Into<FieldValue>,
    ) -> StoreResult<Option<T>> {
        let reply = self.record_action::<T>(RecordOp::RetrieveBy {
            attribute: attribute.to_string(),
            value: value.into(),
        })?;
        match reply {
            Reply::Record(record) => record.map(into_typed::<T>).transpose(),
            other => Err(unexpected(other)),
        }
    }

    pub fn retrieve_all<T: Record>(&self) -> StoreResult<HashMap<String, T>> {
        match self.record_action::<T>(RecordOp::RetrieveAll)? {
            Reply::Records(records) => records
                .into_iter()
                .map(|(key, record)| into_typed::<T>(record).map(|record| (key, record)))
                .collect(),
            other => Err(unexpected(other)),
        }
    }

    pub fn exists<T: Record>(&self, key: &str) -> StoreResult<bool> {
        expect_flag(self.record_action::<T>(RecordOp::Exists {
            key: key.to_string(),
        })?)
    }

    pub fn exists_by<T: Record>(
        &self,
        attribute: &str,
        value: impl Into<FieldValue>,
    ) -> StoreResult<bool> {
        expect_flag(self.record_action::<T>(RecordOp::ExistsBy {
            attribute: attribute.to_string(),
            value: value.into(),
        })?)
    }

    /// Smallest unused non-negative integer key of `T`, as a string.
    pub fn next_id<T: Record>(&self) -> StoreResult<String> {
        expect_key(self.record_action::<T>(RecordOp::NextId)?)
    }

    /// Inserts `record`, assigning `next_id` when its key is empty.
    ///
    /// On success the key is written back into `record` and returned.
    ///
    /// # Errors
    /// - `StoreError::Conflict` when the key is already in use.
    /// - `StoreError::PayloadTooLarge` when the serialized record is too long.
    pub fn create<T: Record>(&self, record: &mut T) -> StoreResult<String> {
        let key = expect_key(self.record_action::<T>(RecordOp::Create {
            record: Box::new(record.clone()),
        })?)?;
        record.set_key(key.clone());
        Ok(key)
    }

    /// Replaces the stored record with the same key.
    ///
    /// # Errors
    /// - `StoreError::NotFound` when no record has the key.
    pub fn update<T: Record>(&self, record: &T) -> StoreResult<()> {
        expect_done(self.record_action::<T>(RecordOp::Update {
            record: Box::new(record.clone()),
        })?)
    }

    /// Creates or replaces `record`; an empty key always creates.
    pub fn upsert<T: Record>(&self, record: &mut T) -> StoreResult<String> {
        let key = expect_key(self.record_action::<T>(RecordOp::Upsert {
            record: Box::new(record.clone()),
        })?)?;
        record.set_key(key.clone());
        Ok(key)
    }

    pub fn remove<T: Record>(&self, record: &T) -> StoreResult<()> {
        expect_done(self.record_action::<T>(RecordOp::Remove {
            record: Box::new(record.clone()),
        })?)
    }

    pub fn remove_by_key<T: Record>(&self, key: &str) -> StoreResult<()> {
        expect_done(self.record_action::<T>(RecordOp::RemoveByKey {
            key: key.to_string(),
        })?)
    }

    /// Bytes stored under `key`, or `None`.
    pub fn blob_retrieve(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.submit(Action::Blob(BlobOp::Retrieve {
            key: key.to_string(),
        }))? {
            Reply::Blob(bytes) => Ok(bytes),
            other => Err(unexpected(other)),
        }
    }

    pub fn blob_create(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        expect_done(self.submit(Action::Blob(BlobOp::Create {
            key: key.to_string(),
            bytes: bytes.to_vec(),
        }))?)
    }

    pub fn blob_update(&self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        expect_done(self.submit(Action::Blob(BlobOp::Update {
            key: key.to_string(),
            bytes: bytes.to_vec(),
        }))?)
    }

    pub fn blob_remove(&self, key: &str) -> StoreResult<()> {
        expect_done(self.submit(Action::Blob(BlobOp::Remove {
            key: key.to_string(),
        }))?)
    }

    fn record_action<T: Record>(&self, op: RecordOp) -> StoreResult<Reply> {
        assert_type_name(T::type_name());
        self.submit(Action::Record {
            target: TypeHandle::of::<T>(),
            op,
        })
    }

    /// Queues `action` and blocks until the actor replies.
    fn submit(&self, action: Action) -> StoreResult<Reply> {
        let sender = self.inner.sender()?;
        let (reply, response) = mpsc::channel();
        sender
            .send(Message::Request { action, reply })
            .map_err(|_| self.inner.lost_reply())?;
        response.recv().map_err(|_| self.inner.lost_reply())?
    }
}

fn into_typed<T: Record>(record: Box<dyn ErasedRecord>) -> StoreResult<T> {
    downcast::<T>(record)
        .ok_or_else(|| StoreError::Fault(format!("cached record is not a {}", T::type_name())))
}

fn unexpected(reply: Reply) -> StoreError {
    StoreError::Fault(format!("unexpected `{}` reply from actor", reply.kind()))
}

fn expect_flag(reply: Reply) -> StoreResult<bool> {
    match reply {
        Reply::Flag(flag) => Ok(flag),
        other => Err(unexpected(other)),
    }
}

fn expect_key(reply: Reply) -> StoreResult<String> {
    match reply {
        Reply::Key(key) => Ok(key),
        other => Err(unexpected(other)),
    }
}

fn expect_done(reply: Reply) -> StoreResult<()> {
    match reply {
        Reply::Done => Ok(()),
        other => Err(unexpected(other)),
    }
}
