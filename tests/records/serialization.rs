//! Plain-object serialization

use crate::common::*;
use serde_json::json;

#[test]
fn saved_record_serializes_its_id() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("id", 123).set("name", "Piggy"));
    assert_eq!(json(&user), json!({ "id": 123, "name": "Piggy" }));
}

#[test]
fn new_record_relabels_its_temporary_id() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("name", "Piggy"));
    let temporary = int_id(&user);
    assert_eq!(
        json(&user),
        json!({ "name": "Piggy", "clientId": temporary })
    );
}

#[test]
fn forced_temporary_record_relabels_a_positive_id() {
    let engine = Engine::new();
    let draft = engine.create_with_config(
        &USER,
        RecordConfig::temporary(),
        Patch::new().set("id", 123).set("name", "Ada"),
    );
    assert_eq!(json(&draft), json!({ "name": "Ada", "clientId": 123 }));
}

#[test]
fn unsaved_relation_is_left_out() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new());
    let profile = engine.create(
        &PROFILE_IMAGE,
        Patch::new().set("name", "avatar").set("User", &user),
    );
    let temporary = int_id(&profile);
    assert_eq!(
        json(&profile),
        json!({ "name": "avatar", "clientId": temporary })
    );
}

#[test]
fn saved_relation_serializes_as_foreign_key() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("id", 123));
    let profile = engine.create(
        &PROFILE_IMAGE,
        Patch::new().set("name", "avatar").set("User", &user),
    );
    let temporary = int_id(&profile);
    assert_eq!(
        json(&profile),
        json!({ "name": "avatar", "userId": 123, "clientId": temporary })
    );
}

#[test]
fn nested_record_without_foreign_key_is_left_out() {
    let engine = Engine::new();
    let image = engine.create(&IMAGE, Patch::new().set("id", 5));
    let profile = engine.create(
        &PROFILE_IMAGE,
        Patch::new().set("id", 9).set("Image", &image),
    );
    assert_eq!(json(&profile), json!({ "id": 9 }));
}

#[test]
fn omit_policy_drops_temporary_ids() {
    let engine = omitting_engine();
    let user = engine.create(&USER, Patch::new().set("name", "Piggy"));
    assert_eq!(json(&user), json!({ "name": "Piggy" }));

    let saved = user.merge(Patch::new().set("id", 3)).unwrap();
    assert_eq!(json(&saved), json!({ "id": 3, "name": "Piggy" }));
}

#[test]
fn custom_client_id_attribute() {
    let engine = Engine::with_config(EngineConfig {
        client_id_attribute: "localId".to_string(),
        ..EngineConfig::default()
    })
    .unwrap();
    let user = engine.create(&USER, Patch::new());
    let plain = user.to_plain_object();
    assert!(plain.contains_key("localId"));
    assert!(!plain.contains_key("id"));
}

#[test]
fn serialization_follows_the_cascade() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new());
    let profile = engine.create(
        &PROFILE_IMAGE,
        Patch::new().set("name", "avatar").set("User", &user),
    );
    user.merge(Patch::new().set("id", 973)).unwrap();
    engine.run_pending();

    let plain = profile.latest().to_plain_object();
    assert_eq!(plain.get("userId"), Some(&Value::Int(973)));
    assert_eq!(plain.get("clientId"), profile.id());
}

#[test]
fn scalar_values_keep_their_json_shape() {
    let engine = Engine::new();
    let user = engine.create(
        &USER,
        Patch::new()
            .set("id", 1)
            .set("active", true)
            .set("score", 2.5)
            .set("nickname", ())
            .set("tags", Value::from(vec![Value::from("a"), Value::from("b")])),
    );
    assert_eq!(
        json(&user),
        json!({
            "id": 1,
            "active": true,
            "score": 2.5,
            "nickname": null,
            "tags": ["a", "b"],
        })
    );
}
