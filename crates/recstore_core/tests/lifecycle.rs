mod common;

use common::Person;
use recstore_core::{
    Driver, DriverError, FieldKind, FieldValue, MemoryDriver, Record, RecordSchema, SchemaError,
    SqliteDriver, Store, StoreConfig, StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::thread;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Counter {
    id: i64,
}

impl Record for Counter {
    fn type_name() -> &'static str {
        "Counter"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new().key("id").field("id", FieldKind::Int)
    }

    fn key(&self) -> &str {
        ""
    }

    fn set_key(&mut self, _key: String) {}

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "id").then(|| self.id.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Dotted {
    id: String,
}

impl Record for Dotted {
    fn type_name() -> &'static str {
        "billing.Dotted"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new().key("id").field("id", FieldKind::String)
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "id").then(|| self.id.as_str().into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditEntry {
    id: String,
}

impl Record for AuditEntry {
    fn type_name() -> &'static str {
        "AuditEntry"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new().key("id").field("id", FieldKind::String)
    }

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "id").then(|| self.id.as_str().into())
    }
}

/// Same type name as `Person`, different Rust type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersonV2 {
    id: String,
    nickname: String,
}

impl Record for PersonV2 {
    fn type_name() -> &'static str {
        "Person"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .key("id")
            .field("id", FieldKind::String)
            .field("nickname", FieldKind::String)
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
            "nickname" => Some(self.nickname.as_str().into()),
            _ => None,
        }
    }
}

/// Declares `id` as key but returns `handle` from `key()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Alias {
    id: String,
    handle: String,
}

impl Record for Alias {
    fn type_name() -> &'static str {
        "Alias"
    }

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .key("id")
            .field("id", FieldKind::String)
            .field("handle", FieldKind::String)
    }

    fn key(&self) -> &str {
        &self.handle
    }

    fn set_key(&mut self, key: String) {
        self.handle = key;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "handle" => Some(self.handle.as_str().into()),
            _ => None,
        }
    }
}

#[test]
fn unsupported_scheme_is_a_config_error() {
    for uri in ["mysql:root@/db", "sqlite3:", "", "memory:extra"] {
        let err = Store::open(uri).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)), "uri `{uri}`");
    }
}

#[test]
fn unopenable_database_is_a_backend_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let uri = format!("redb:{}", blocker.join("store.redb").display());
    let err = Store::open(&uri).err().unwrap();
    assert!(matches!(err, StoreError::Backend(_)));
}

#[test]
fn every_call_after_close_is_uninitialized() {
    let store = Store::open("memory:").unwrap();
    let other = store.clone();
    store.create(&mut Person::new("", "Ada", 36)).unwrap();

    other.close().unwrap();
    assert!(!store.is_open());

    assert!(matches!(
        store.retrieve::<Person>("0"),
        Err(StoreError::Uninitialized)
    ));
    assert!(matches!(
        store.create(&mut Person::new("", "Grace", 45)),
        Err(StoreError::Uninitialized)
    ));
    assert!(matches!(
        store.next_id::<Person>(),
        Err(StoreError::Uninitialized)
    ));
    assert!(matches!(
        store.blob_create("b", b"x"),
        Err(StoreError::Uninitialized)
    ));
    assert!(matches!(store.close(), Err(StoreError::Uninitialized)));
}

#[test]
fn close_drains_queued_actions() {
    let store = Store::open("memory:").unwrap();
    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    store.create(&mut Person::new("", "Ada", 36)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(store.retrieve_all::<Person>().unwrap().len(), 40);
    store.close().unwrap();
}

#[test]
fn concurrent_creates_get_distinct_keys() {
    let store = Store::open("memory:").unwrap();
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|n| {
                        let mut person = Person::new("", &format!("w{worker}-{n}"), n);
                        store.create(&mut person).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let keys: HashSet<String> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    let expected: HashSet<String> = (0..200).map(|n: u32| n.to_string()).collect();
    assert_eq!(keys, expected);
    store.close().unwrap();
}

#[test]
fn records_and_blobs_reload_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    for uri in [
        format!("sqlite3:{}", dir.path().join("reload.db").display()),
        format!("redb:{}", dir.path().join("reload.redb").display()),
    ] {
        let store = Store::open(&uri).unwrap();
        let mut ada = Person::new("", "Ada", 36);
        store.create(&mut ada).unwrap();
        store.create(&mut Person::new("grace", "Grace", 45)).unwrap();
        store.blob_create("avatar", b"png").unwrap();
        store.close().unwrap();

        let store = Store::open(&uri).unwrap();
        assert_eq!(store.retrieve::<Person>("0").unwrap(), Some(ada));
        assert_eq!(store.retrieve_all::<Person>().unwrap().len(), 2);
        assert_eq!(store.next_id::<Person>().unwrap(), "1");
        assert_eq!(store.blob_retrieve("avatar").unwrap(), Some(b"png".to_vec()));
        store.close().unwrap();
    }
}

#[test]
fn contexts_isolate_record_tables_but_share_blobs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contexts.db");
    let uri = format!("sqlite3:{}", path.display());

    let open_in = |context: &str| {
        let config = StoreConfig::from_uri(&uri)
            .unwrap()
            .with_context(context)
            .unwrap();
        Store::open_with(config).unwrap()
    };

    let alpha = open_in("alpha");
    alpha.create(&mut Person::new("", "Ada", 36)).unwrap();
    alpha.blob_create("shared", b"1").unwrap();
    alpha.close().unwrap();

    let beta = open_in("beta");
    assert!(beta.retrieve_all::<Person>().unwrap().is_empty());
    assert_eq!(beta.blob_retrieve("shared").unwrap(), Some(b"1".to_vec()));
    beta.close().unwrap();

    let mut driver = SqliteDriver::open(&path).unwrap();
    assert_eq!(driver.retrieve_all("alpha.Person").unwrap().len(), 1);
    assert!(driver.retrieve_all("Person").unwrap().is_empty());
    driver.close().unwrap();
}

#[test]
fn invalid_context_is_rejected() {
    let config = StoreConfig::from_uri("memory:").unwrap();
    assert!(matches!(
        config.clone().with_context("has.dot"),
        Err(StoreError::Config(_))
    ));
    assert!(matches!(
        config.with_context(""),
        Err(StoreError::Config(_))
    ));
}

#[test]
fn hand_built_invalid_context_is_rejected_at_open() {
    let mut config = StoreConfig::from_uri("memory:").unwrap();
    config.context = Some(String::new());
    assert!(matches!(
        Store::with_driver(Box::new(MemoryDriver::new()), config.clone()),
        Err(StoreError::Config(_))
    ));

    config.context = Some("has.dot".to_string());
    assert!(matches!(
        Store::open_with(config),
        Err(StoreError::Config(_))
    ));
}

#[test]
fn overlong_table_name_is_rejected_without_faulting() {
    let context = "c".repeat(32);
    let config = StoreConfig::from_uri("memory:")
        .unwrap()
        .with_context(context)
        .unwrap();
    let store = Store::open_with(config).unwrap();

    // 32 + 1 + "AuditEntry".len() exceeds the 40 character table limit.
    let err = store.exists::<AuditEntry>("x").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Backend(DriverError::InvalidTableName(_))
    ));
    assert!(!store.exists::<Person>("x").unwrap());
    store.close().unwrap();
}

#[test]
fn non_string_key_is_a_schema_error_and_store_stays_usable() {
    let store = Store::open("memory:").unwrap();

    for _ in 0..2 {
        let err = store.retrieve_all::<Counter>().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaError::KeyFieldNotString { .. })
        ));
    }
    store.create(&mut Person::new("", "Ada", 36)).unwrap();
    store.close().unwrap();
}

#[test]
#[should_panic(expected = "reserved context separator")]
fn dotted_type_name_panics_on_the_caller() {
    let store = Store::open("memory:").unwrap();
    let _ = store.exists::<Dotted>("x");
}

#[test]
fn second_type_with_same_name_is_rejected_and_first_keeps_working() {
    let store = Store::open("memory:").unwrap();
    let mut ada = Person::new("", "Ada", 36);
    store.create(&mut ada).unwrap();

    let err = store.retrieve_all::<PersonV2>().unwrap_err();
    assert!(matches!(
        err,
        StoreError::Schema(SchemaError::DuplicateTypeName(ref name)) if name == "Person"
    ));
    let mut other = PersonV2 {
        id: String::new(),
        nickname: "ada".to_string(),
    };
    assert!(store.create(&mut other).is_err());

    let people = store.retrieve_all::<Person>().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[&ada.id].name, "Ada");
    store.close().unwrap();
}

#[test]
fn key_accessor_mismatch_is_rejected_before_any_write() {
    let store = Store::open("memory:").unwrap();
    let mut alias = Alias {
        id: "1".to_string(),
        handle: "ada".to_string(),
    };

    let err = store.create(&mut alias).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Schema(SchemaError::KeyAccessorMismatch { ref field, .. }) if field == "id"
    ));
    assert!(matches!(
        store.upsert(&mut alias),
        Err(StoreError::Schema(SchemaError::KeyAccessorMismatch { .. }))
    ));
    assert!(store.retrieve_all::<Alias>().unwrap().is_empty());
    assert!(!store.exists::<Alias>("ada").unwrap());
    store.close().unwrap();
}
