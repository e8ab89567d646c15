//! Merge semantics: immutability, idempotence, config overrides

use crate::common::*;
use proptest::prelude::*;

#[test]
fn merge_never_mutates_the_receiver() {
    let engine = Engine::new();
    let v1 = engine.create(&USER, Patch::new().set("name", "Ada"));
    let before = v1.snapshot().clone();

    let v2 = v1.merge(Patch::new().set("name", "Grace")).unwrap();
    let v3 = v2.merge(Patch::new().set("city", "London")).unwrap();

    assert_eq!(v1.snapshot(), &before);
    assert_eq!(v1.get_value("name"), Some(&Value::from("Ada")));
    assert_eq!(v2.get_value("name"), Some(&Value::from("Grace")));
    assert!(v2.get("city").is_none());
    assert_eq!(v3.get_value("city"), Some(&Value::from("London")));
    assert_eq!(
        (v1.revision(), v2.revision(), v3.revision()),
        (0, 1, 2)
    );
}

#[test]
fn merge_keeps_unpatched_attributes() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("id", 5).set("name", "Ada"));
    let next = user.merge(Patch::new().set("age", 36)).unwrap();
    assert_eq!(next.id(), Some(&Value::Int(5)));
    assert_eq!(next.get_value("name"), Some(&Value::from("Ada")));
    assert_eq!(next.get_value("age"), Some(&Value::Int(36)));
}

#[test]
fn noop_merge_returns_the_same_instance() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("name", "Ada").set("age", 36));

    let same = user.merge(Patch::new().set("name", "Ada")).unwrap();
    assert!(Record::ptr_eq(&user, &same));

    let same = user.merge(Patch::new()).unwrap();
    assert!(Record::ptr_eq(&user, &same));
    assert_eq!(user.registry().next_revision_number(), 1);
}

#[test]
fn merging_the_same_related_record_is_a_noop() {
    let engine = Engine::new();
    let image = engine.create(&IMAGE, Patch::new());
    let profile = engine.create(&PROFILE_IMAGE, Patch::new().set("Image", &image));
    let same = profile.merge(Patch::new().set("Image", &image)).unwrap();
    assert!(Record::ptr_eq(&profile, &same));
}

#[test]
fn config_override_produces_new_version() {
    let engine = Engine::new();
    let draft = engine.create_with_config(
        &USER,
        RecordConfig::temporary(),
        Patch::new().set("id", 123).set("name", "Ada"),
    );
    assert_eq!(engine.pending(), 0);

    let same = draft
        .merge_with_config(Patch::new(), &ConfigOverride::force_temporary(true))
        .unwrap();
    assert!(Record::ptr_eq(&draft, &same));

    let saved = draft
        .merge_with_config(Patch::new(), &ConfigOverride::force_temporary(false))
        .unwrap();
    assert!(!saved.is_new_record());
    assert!(!saved.config().force_temporary);
    assert!(draft.config().force_temporary);
}

#[test]
fn failed_merge_changes_nothing() {
    let engine = Engine::new();
    let user = engine.create(&USER, Patch::new().set("id", 1).set("name", "Ada"));
    let result = user.merge(Patch::new().set("name", "Grace").set("id", 2));
    assert!(result.is_err());
    assert!(Record::ptr_eq(&user.latest(), &user));
    assert_eq!(user.get_value("name"), Some(&Value::from("Ada")));
    assert_eq!(engine.pending(), 0);
}

#[test]
fn merging_from_a_stale_version_branches_from_it() {
    let engine = Engine::new();
    let v1 = engine.create(&USER, Patch::new().set("name", "Ada"));
    let _v2 = v1.merge(Patch::new().set("age", 36)).unwrap();
    let v3 = v1.merge(Patch::new().set("city", "London")).unwrap();
    assert!(v3.get("age").is_none());
    assert!(Record::ptr_eq(&v3.latest(), &v3));
}

#[test]
fn merging_nan_back_in_is_a_noop() {
    let engine = Engine::new();
    let reading = engine.create(&USER, Patch::new().set("id", 3).set("score", f64::NAN));
    let same = reading.merge(Patch::new().set("score", f64::NAN)).unwrap();
    assert!(Record::ptr_eq(&reading, &same));
    assert_eq!(same.revision(), 0);
    assert_eq!(engine.pending(), 0);

    let changed = same.merge(Patch::new().set("score", 1.5)).unwrap();
    assert!(!Record::ptr_eq(&same, &changed));
    assert!(changed.is_changed(same.snapshot()));
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn patch_entries() -> impl Strategy<Value = Vec<(String, Value)>> {
    let name = "[a-z]{1,4}".prop_filter("id is guarded separately", |n| n != "id");
    prop::collection::vec((name, scalar()), 0..6)
}

proptest! {
    #[test]
    fn merging_twice_is_idempotent(entries in patch_entries()) {
        let engine = Engine::new();
        let user = engine.create(&USER, Patch::new().set("id", 42));
        let patch: Patch = entries.into_iter().collect();

        let once = user.merge(patch.clone()).unwrap();
        let twice = once.merge(patch).unwrap();
        prop_assert!(Record::ptr_eq(&once, &twice));
    }

    #[test]
    fn merge_result_reflects_the_patch(entries in patch_entries()) {
        let engine = Engine::new();
        let user = engine.create(&USER, Patch::new().set("id", 42));
        let patch: Patch = entries.clone().into_iter().collect();
        let merged = user.merge(patch.clone()).unwrap();

        for (name, _) in &entries {
            let expected = patch.get(name).and_then(Attribute::as_value);
            prop_assert_eq!(merged.get_value(name), expected);
        }
        prop_assert_eq!(merged.id(), Some(&Value::Int(42)));
    }
}
