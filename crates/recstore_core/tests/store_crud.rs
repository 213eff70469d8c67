mod common;

use common::{Invoice, Person};
use recstore_core::{Store, StoreError};

/// Runs `check` against a fresh store on every backend.
fn for_each_backend(check: impl Fn(&Store)) {
    let dir = tempfile::tempdir().unwrap();
    let uris = [
        "memory:".to_string(),
        format!("sqlite3:{}", dir.path().join("crud.db").display()),
        format!("redb:{}", dir.path().join("crud.redb").display()),
    ];
    for uri in uris {
        let store = Store::open(&uri).unwrap();
        check(&store);
        store.close().unwrap();
    }
}

#[test]
fn create_then_retrieve_roundtrip() {
    for_each_backend(|store| {
        let mut ada = Person::new("", "Ada", 36);
        let key = store.create(&mut ada).unwrap();

        assert_eq!(key, "0");
        assert_eq!(ada.id, "0");
        assert_eq!(store.retrieve::<Person>(&key).unwrap(), Some(ada.clone()));
        assert_eq!(store.retrieve::<Person>("missing").unwrap(), None);
    });
}

#[test]
fn retrieved_records_are_private_copies() {
    for_each_backend(|store| {
        let mut ada = Person::new("ada", "Ada", 36);
        store.create(&mut ada).unwrap();

        ada.name = "changed after create".to_string();
        let mut loaded = store.retrieve::<Person>("ada").unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");

        loaded.name = "changed after retrieve".to_string();
        assert_eq!(
            store.retrieve::<Person>("ada").unwrap().unwrap().name,
            "Ada"
        );
    });
}

#[test]
fn create_with_key_in_use_is_a_conflict() {
    for_each_backend(|store| {
        store.create(&mut Person::new("7", "Ada", 36)).unwrap();

        let err = store.create(&mut Person::new("7", "Grace", 45)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.retrieve::<Person>("7").unwrap().unwrap().name, "Ada");
        assert_eq!(store.retrieve_all::<Person>().unwrap().len(), 1);
    });
}

#[test]
fn update_replaces_existing_record_only() {
    for_each_backend(|store| {
        let mut ada = Person::new("", "Ada", 36);
        store.create(&mut ada).unwrap();

        ada.age = 37;
        store.update(&ada).unwrap();
        assert_eq!(store.retrieve::<Person>(&ada.id).unwrap().unwrap().age, 37);

        let err = store.update(&Person::new("ghost", "Nobody", 0)).unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.exists::<Person>("ghost").unwrap());
    });
}

#[test]
fn upsert_creates_or_replaces() {
    for_each_backend(|store| {
        let mut fresh = Person::new("", "Ada", 36);
        let key = store.upsert(&mut fresh).unwrap();
        assert_eq!(key, "0");
        assert_eq!(fresh.id, "0");

        let mut named = Person::new("grace", "Grace", 45);
        store.upsert(&mut named).unwrap();

        named.age = 46;
        assert_eq!(store.upsert(&mut named).unwrap(), "grace");
        assert_eq!(
            store.retrieve::<Person>("grace").unwrap().unwrap().age,
            46
        );
        assert_eq!(store.retrieve_all::<Person>().unwrap().len(), 2);
    });
}

#[test]
fn remove_and_remove_by_key() {
    for_each_backend(|store| {
        let mut ada = Person::new("", "Ada", 36);
        let mut grace = Person::new("", "Grace", 45);
        store.create(&mut ada).unwrap();
        store.create(&mut grace).unwrap();

        store.remove(&ada).unwrap();
        store.remove_by_key::<Person>(&grace.id).unwrap();
        assert!(store.retrieve_all::<Person>().unwrap().is_empty());

        assert!(store.remove(&ada).unwrap_err().is_not_found());
        assert!(store
            .remove_by_key::<Person>("never-there")
            .unwrap_err()
            .is_not_found());
    });
}

#[test]
fn next_id_reuses_first_free_integer() {
    for_each_backend(|store| {
        assert_eq!(store.next_id::<Person>().unwrap(), "0");
        store.create(&mut Person::new("", "Ada", 36)).unwrap();
        store.create(&mut Person::new("", "Grace", 45)).unwrap();
        assert_eq!(store.next_id::<Person>().unwrap(), "2");

        store.remove_by_key::<Person>("0").unwrap();
        assert_eq!(store.next_id::<Person>().unwrap(), "0");

        store.create(&mut Person::new("alice", "Alice", 20)).unwrap();
        assert_eq!(store.next_id::<Person>().unwrap(), "0");
    });
}

#[test]
fn retrieve_by_matches_declared_kind_only() {
    for_each_backend(|store| {
        store.create(&mut Person::new("", "Ada", 36)).unwrap();
        store.create(&mut Person::new("", "Grace", 45)).unwrap();

        let grace = store.retrieve_by::<Person>("name", "Grace").unwrap().unwrap();
        assert_eq!(grace.age, 45);
        assert_eq!(
            store.retrieve_by::<Person>("age", 36_i64).unwrap().unwrap().name,
            "Ada"
        );

        assert_eq!(store.retrieve_by::<Person>("age", "36").unwrap(), None);
        assert_eq!(store.retrieve_by::<Person>("age", 36_u64).unwrap(), None);
        assert_eq!(store.retrieve_by::<Person>("height", 36_i64).unwrap(), None);
        assert!(store.exists_by::<Person>("name", "Ada").unwrap());
        assert!(!store.exists_by::<Person>("name", "Linus").unwrap());
    });
}

#[test]
fn opaque_fields_never_match() {
    for_each_backend(|store| {
        let mut invoice = Invoice {
            number: "INV-1".to_string(),
            lines: vec!["coffee".to_string()],
        };
        store.create(&mut invoice).unwrap();

        assert!(store.exists::<Invoice>("INV-1").unwrap());
        assert!(!store.exists_by::<Invoice>("lines", "coffee").unwrap());
        assert_eq!(
            store.retrieve::<Invoice>("INV-1").unwrap(),
            Some(invoice.clone())
        );
    });
}

#[test]
fn record_types_use_separate_key_spaces() {
    for_each_backend(|store| {
        store.create(&mut Person::new("1", "Ada", 36)).unwrap();
        store
            .create(&mut Invoice {
                number: "1".to_string(),
                lines: Vec::new(),
            })
            .unwrap();

        assert_eq!(store.retrieve_all::<Person>().unwrap().len(), 1);
        assert_eq!(store.retrieve_all::<Invoice>().unwrap().len(), 1);
    });
}
