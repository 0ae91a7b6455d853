//! Serialization of populated and loaded entities.

mod common;

use common::{configurator, fixtures};
use entity_configurator::{Identifier, Serializer};
use serde_json::json;

#[tokio::test]
async fn test_root_entity_by_group() {
    let mut configurator = configurator();
    configurator
        .create(&fixtures::user_payload(), "User")
        .await
        .unwrap();
    let root = configurator.entity().unwrap();
    let serializer = Serializer::new(fixtures::registry());

    let test = serializer
        .to_array(configurator.unit_of_work(), root, &["test"])
        .unwrap();
    assert_eq!(test, json!({"id": 1, "email": "jane@example.com"}));

    let public = serializer
        .to_array(configurator.unit_of_work(), root, &["public"])
        .unwrap();
    assert_eq!(
        public,
        json!({
            "id": 1,
            "email": "jane@example.com",
            "name": "Jane",
            "age": null,
            "address": {"id": 1, "zip": "12345", "city": "Springfield"},
            "tags": [],
            "company": null
        })
    );
    assert!(public.get("password").is_none());
}

#[tokio::test]
async fn test_unloaded_links_render_as_identifiers() {
    let mut configurator = configurator();
    configurator
        .create(&fixtures::user_payload(), "User")
        .await
        .unwrap();

    // Fresh unit of work: the address is only referenced
    configurator.manager_mut().clear();
    let root = configurator
        .manager_mut()
        .load("User", &Identifier::single(1))
        .await
        .unwrap();

    let value = Serializer::new(fixtures::registry())
        .to_array(configurator.unit_of_work(), root, &["public"])
        .unwrap();
    assert_eq!(value["address"], json!({"id": 1}));
}

#[tokio::test]
async fn test_collection_from_store() {
    let mut configurator = configurator();
    for email in ["a@example.com", "b@example.com", "c@example.com"] {
        configurator
            .create(&json!({"email": email}), "User")
            .await
            .unwrap();
    }

    configurator.manager_mut().clear();
    let users = configurator
        .manager_mut()
        .find_all("User", 0, 10)
        .await
        .unwrap();

    let serializer = Serializer::new(fixtures::registry());
    let value = serializer
        .to_array(configurator.unit_of_work(), &users, &["test"])
        .unwrap();
    assert_eq!(
        value,
        json!([
            {"id": 1, "email": "a@example.com"},
            {"id": 2, "email": "b@example.com"},
            {"id": 3, "email": "c@example.com"}
        ])
    );

    let text = serializer
        .to_json_string(configurator.unit_of_work(), &users[..0], &["test"])
        .unwrap();
    assert_eq!(text, "[]");
}
