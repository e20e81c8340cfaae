use formcheck::{FieldError, Key, KeyGetter, ListSource, Schema, Validation, ValidationTree};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::Rc;

fn v() -> Validation {
    Validation::new()
}

fn rules_and_paths(errors: &[FieldError]) -> Vec<(String, Vec<Key>)> {
    errors.iter().map(|e| (e.rule.clone(), e.path.clone())).collect()
}

#[test]
fn fields_report_the_failing_field() {
    let mut tree = ValidationTree::new(
        v().add_field("field1", v().max_length(10))
            .add_field("field2", v().max_length(10)),
    );
    assert!(!tree.test_root(&json!({ "field1": "12345", "field2": "123456789012345" })));
    assert_eq!(
        rules_and_paths(tree.root().errors()),
        vec![("maxLength".to_string(), vec![Key::from("field2")])]
    );
}

#[test]
fn every_over_a_list() {
    let mut tree = ValidationTree::new(v().add_every(|| v().min(1)));
    assert!(!tree.test_root(&json!([1, 2, 0])));
    assert_eq!(
        rules_and_paths(tree.root().errors()),
        vec![("min".to_string(), vec![Key::Index(2)])]
    );
    assert!(tree.test_root(&json!([1, 2, 3])));
    assert!(tree.test_root(&json!([])));
    assert!(tree.test_root(&Value::Null));
}

#[test]
fn every_keyed_by_id() {
    let mut tree = ValidationTree::new(v().add_every_by(
        || v().add_field("attr", v().required()),
        KeyGetter::func(|item| Key::from_value(&item["id"])),
    ));
    assert!(!tree.test_root(&json!([{ "id": 22, "attr": "asd" }, { "id": 11, "attr": null }])));
    let root = tree.root();
    assert!(root.every(11).unwrap().field("attr").unwrap().is_invalid());
    assert!(root.every(22).unwrap().field("attr").unwrap().is_valid());
}

#[test]
fn keyed_state_follows_the_element() {
    let mut tree = ValidationTree::new(v().add_every_by(|| v().add_field("attr", v().required()), "id"));
    tree.test_root(&json!([{ "id": "a", "attr": null }, { "id": "b", "attr": "x" }]));
    let a = tree.root().every("a").unwrap().id();

    // Reorder; the instance for "a" is reused and still reports its error.
    assert!(!tree.test_root(&json!([{ "id": "b", "attr": "x" }, { "id": "a", "attr": null }])));
    assert_eq!(tree.root().every("a").unwrap().id(), a);
    assert_eq!(
        rules_and_paths(tree.root().errors()),
        vec![("required".to_string(), vec![Key::from("a"), Key::from("attr")])]
    );

    // Drop "a"; its instance is freed.
    assert!(tree.test_root(&json!([{ "id": "b", "attr": "x" }])));
    assert!(!tree.contains(a));
    assert!(tree.root().every("a").is_none());
}

#[test]
fn some_needs_one_passing_element() {
    let mut tree = ValidationTree::new(v().add_some(|| v().min(1)));
    assert!(!tree.test_root(&json!([0, 0, -100])));
    assert_eq!(
        rules_and_paths(tree.root().errors()),
        vec![
            ("min".to_string(), vec![Key::Index(0)]),
            ("min".to_string(), vec![Key::Index(1)]),
            ("min".to_string(), vec![Key::Index(2)]),
        ]
    );
    assert!(tree.test_root(&json!([10, 0, -100])));
    assert!(tree.test_root(&Value::Null));
    assert!(!tree.test_root(&json!([])));
    assert!(tree.root().is_invalid());
    assert!(!tree.root().errors().is_empty());
}

#[test]
fn uniqueness_across_nested_lists() {
    let data = Rc::new(RefCell::new(json!({
        "arr1": [
            { "arr2": [{ "id": 1 }, { "id": 2 }, { "id": 4 }] },
            { "arr2": [{ "id": 5 }, { "id": 6 }, { "id": 1 }] }
        ]
    })));
    let source = Rc::clone(&data);
    let leaves = ListSource::live(move || {
        let data = source.borrow();
        let all: Vec<Value> = data["arr1"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|item| item["arr2"].as_array())
            .flatten()
            .cloned()
            .collect();
        all
    });
    let msg = "element should be globally unique";
    let mut tree = ValidationTree::new(v().add_field(
        "arr1",
        v().add_every(move || {
            let leaves = leaves.clone();
            v().add_field(
                "arr2",
                v().add_every(move || v().max_times_in_list(leaves.clone(), 1).msg(msg)),
            )
        }),
    ));

    let snapshot = data.borrow().clone();
    assert!(!tree.test_root(&snapshot));
    let errors = tree.root().errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.rule == "maxTimesInList" && e.message == msg));
    let paths: Vec<_> = errors.iter().map(|e| e.path.clone()).collect();
    assert!(paths.contains(&vec!["arr1".into(), Key::Index(0), "arr2".into(), Key::Index(0)]));
    assert!(paths.contains(&vec!["arr1".into(), Key::Index(1), "arr2".into(), Key::Index(2)]));

    // The live list sees the fix on the next test.
    data.borrow_mut()["arr1"][1]["arr2"][2] = json!({ "id": 3 });
    let fixed = data.borrow().clone();
    assert!(tree.test_root(&fixed));
}

#[test]
fn partial_test_through_get_matches_full_test() {
    let form = || {
        v().add_field("person", v().add_field("name", v().required()).add_field("age", v().integer()))
            .add_field("tags", v().add_every(|| v().min_length(2)))
    };
    let before = json!({ "person": { "name": "", "age": 1.5 }, "tags": ["ok", "x"] });
    let after = json!({ "person": { "name": "Ada", "age": 1.5 }, "tags": ["ok", "x"] });

    let mut partial = ValidationTree::new(form());
    partial.test_root(&before);
    let (name, value) = partial
        .locate(partial.root_id(), &after, &["person".into(), "name".into()])
        .unwrap();
    partial.test(name, value).unwrap();

    let mut full = ValidationTree::new(form());
    full.test_root(&after);

    assert_eq!(partial.root().is_valid(), full.root().is_valid());
    assert_eq!(partial.root().errors(), full.root().errors());
    assert_eq!(
        rules_and_paths(full.root().errors()),
        vec![
            ("integer".to_string(), vec![Key::from("person"), Key::from("age")]),
            ("minLength".to_string(), vec![Key::from("tags"), Key::Index(1)]),
        ]
    );
}

#[test]
fn reset_returns_to_untested() {
    let mut tree = ValidationTree::new(v().add_field("a", v().required()));
    tree.test_root(&json!({}));
    let root = tree.root_id();
    tree.reset(root).unwrap();
    assert!(tree.root().is_valid());
    assert!(!tree.root().is_dirty());
    assert!(tree.root().errors().is_empty());
    assert!(!tree.root().field("a").unwrap().is_dirty());
}

#[test]
fn schema_document_end_to_end() {
    let schema = Schema::from_json(
        r#"{
            "fields": {
                "type": { "rules": [{ "rule": "required" }, { "rule": "inList", "value": ["RESOURCE", "BASE", "INDICATOR"] }] },
                "person": {
                    "fields": {
                        "firstName": { "rules": [{ "rule": "required" }, { "rule": "minLength", "value": 2 }] },
                        "birthDate": { "rules": [{ "rule": "dateTime" }, { "rule": "minDateTime", "value": "1900-01-01" }] }
                    }
                },
                "emails": { "some": { "schema": { "rules": [{ "rule": "email" }] } } }
            }
        }"#,
    )
    .unwrap();
    let mut tree = ValidationTree::new(schema.build().unwrap());
    assert!(tree.test_root(&json!({
        "type": "BASE",
        "person": { "firstName": "Johnny", "birthDate": "1973-01-20" },
        "emails": ["nope", "johnny@example.com"]
    })));

    assert!(!tree.test_root(&json!({
        "type": "BASE",
        "person": { "firstName": "J", "birthDate": "1873-01-20" },
        "emails": ["nope"]
    })));
    let mut got = rules_and_paths(tree.root().errors());
    got.sort();
    assert_eq!(
        got,
        vec![
            ("email".to_string(), vec![Key::from("emails"), Key::Index(0)]),
            ("minDateTime".to_string(), vec![Key::from("person"), Key::from("birthDate")]),
            ("minLength".to_string(), vec![Key::from("person"), Key::from("firstName")]),
        ]
    );
}
