//! Property-based tests for population invariants.

mod common;

use common::configurator_with;
use entity_configurator::storage::{EntityStore, InMemoryStore, StorageKey};
use entity_configurator::{ConfiguratorError, EntityContext};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn scalar_update_strategy() -> impl Strategy<Value = Map<String, Value>> {
    (
        proptest::option::of("[a-z]{1,10}@[a-z]{1,8}\\.[a-z]{2,3}"),
        proptest::option::of("[A-Za-z]{1,20}"),
        proptest::option::of(0u8..=150),
    )
        .prop_map(|(email, name, age)| {
            let mut update = Map::new();
            if let Some(email) = email {
                update.insert("email".to_string(), json!(email));
            }
            if let Some(name) = name {
                update.insert("name".to_string(), json!(name));
            }
            if let Some(age) = age {
                update.insert("age".to_string(), json!(age));
            }
            update
        })
}

async fn stored_fields(store: &InMemoryStore) -> Map<String, Value> {
    let record = store
        .get(&StorageKey::new("User", "1"))
        .await
        .unwrap()
        .unwrap();
    record.data["fields"].as_object().cloned().unwrap()
}

proptest! {
    #[test]
    fn test_strict_fill_without_identifier_never_writes(
        email in "[a-z@.]{0,20}",
        name in "[A-Za-z ]{0,20}"
    ) {
        tokio_test::block_on(async {
            let store = InMemoryStore::new();
            let mut configurator = configurator_with(store.clone(), EntityContext::default());

            let err = configurator
                .fill_strict(&json!({"email": email, "name": name}), "User")
                .await
                .unwrap_err();

            assert!(matches!(err, ConfiguratorError::InvalidPayload { .. }));
            assert_eq!(store.count("User").await.unwrap(), 0);
        });
    }
}

proptest! {
    #[test]
    fn test_partial_update_is_idempotent(update in scalar_update_strategy()) {
        tokio_test::block_on(async {
            let store = InMemoryStore::new();
            let mut configurator = configurator_with(store.clone(), EntityContext::default());
            configurator
                .create(&json!({"email": "jane@example.com", "name": "Jane", "age": 30}), "User")
                .await
                .unwrap();
            let before = stored_fields(&store).await;

            let mut payload = update.clone();
            payload.insert("id".to_string(), json!(1));
            let payload = Value::Object(payload);

            let errors = configurator.save(&payload, "User").await.unwrap();
            assert!(errors.is_empty(), "unexpected errors {errors}");
            let after = stored_fields(&store).await;

            for (field, value) in &before {
                let expected = update.get(field).unwrap_or(value);
                assert_eq!(after.get(field), Some(expected), "field {field}");
            }

            configurator.save(&payload, "User").await.unwrap();
            assert_eq!(stored_fields(&store).await, after);
        });
    }
}

proptest! {
    #[test]
    fn test_to_many_accumulates_every_identified_child(
        batches in proptest::collection::vec(proptest::sample::subsequence(vec!["a", "b", "c", "d"], 0..=4), 1..4)
    ) {
        tokio_test::block_on(async {
            let store = InMemoryStore::new();
            let mut configurator = configurator_with(store.clone(), EntityContext::default());
            for name in ["a", "b", "c", "d"] {
                configurator.create(&json!({"name": name}), "Tag").await.unwrap();
            }
            configurator
                .create(&json!({"email": "jane@example.com"}), "User")
                .await
                .unwrap();

            let mut expected: Vec<&str> = Vec::new();
            for batch in &batches {
                let tags: Vec<Value> = batch.iter().map(|name| json!({"name": name})).collect();
                configurator
                    .save(&json!({"id": 1, "tags": tags}), "User")
                    .await
                    .unwrap();
                for name in batch {
                    if !expected.contains(name) {
                        expected.push(name);
                    }
                }
            }

            let record = store.get(&StorageKey::new("User", "1")).await.unwrap().unwrap();
            let linked: Vec<Value> = expected.iter().map(|name| json!([name])).collect();
            assert_eq!(record.data["links"]["tags"]["many"], Value::Array(linked));
        });
    }
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_identifiers() {
    let store = InMemoryStore::new();
    let mut configurators: Vec<_> = (0..8)
        .map(|_| configurator_with(store.clone(), EntityContext::default()))
        .collect();

    let creates = configurators.iter_mut().enumerate().map(|(i, configurator)| async move {
        configurator
            .create(&json!({"email": format!("user{i}@example.com")}), "User")
            .await
    });
    let results = futures::future::join_all(creates).await;

    assert!(results.iter().all(|result| result.as_ref().is_ok_and(|errors| errors.is_empty())));
    assert_eq!(store.count("User").await.unwrap(), 8);
}
