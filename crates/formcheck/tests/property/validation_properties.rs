use formcheck::{Key, NodeRef, Validation, ValidationTree, compile_path, path};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn form() -> Validation {
    Validation::new()
        .add_field("name", Validation::new().required().max_length(5))
        .add_field("age", Validation::new().integer().min(0).max(150))
        .add_field(
            "tags",
            Validation::new()
                .array()
                .add_every(|| Validation::new().string().min_length(2)),
        )
        .add_field(
            "contacts",
            Validation::new().add_some(|| {
                Validation::new().add_field("email", Validation::new().required().email())
            }),
        )
        .add_child("meta", Validation::new().add_field("name", Validation::new().not_equals("admin")))
}

const FIELDS: [&str; 4] = ["name", "age", "tags", "contacts"];

fn name() -> impl Strategy<Value = Value> {
    prop_oneof![Just(Value::Null), Just(json!("admin")), "[a-z ]{0,8}".prop_map(Value::from)]
}

fn age() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (-5i64..200).prop_map(Value::from),
        Just(json!(2.5)),
        Just(json!("x")),
    ]
}

fn tags() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        prop::collection::vec("[a-z]{0,3}", 0..4).prop_map(|t| json!(t)),
        Just(json!("not a list")),
    ]
}

fn contacts() -> impl Strategy<Value = Value> {
    let email = prop_oneof!["[a-z]{1,4}@[a-z]{1,4}\\.com", "[a-z]{0,4}"];
    prop_oneof![
        Just(Value::Null),
        prop::collection::vec(email.prop_map(|e| json!({ "email": e })), 0..3).prop_map(Value::from),
    ]
}

fn form_data() -> impl Strategy<Value = Value> {
    (name(), age(), tags(), contacts()).prop_map(|(name, age, tags, contacts)| {
        let mut map = Map::new();
        for (key, value) in FIELDS.iter().zip([name, age, tags, contacts]) {
            map.insert(key.to_string(), value);
        }
        Value::Object(map)
    })
}

fn check_consistent(node: NodeRef<'_>) -> Result<(), TestCaseError> {
    prop_assert_eq!(node.is_valid(), node.errors().is_empty(), "node {:?}", node.full_path());
    for (_, field) in node.fields() {
        check_consistent(field)?;
    }
    for (_, child) in node.children() {
        check_consistent(child)?;
    }
    for instance in node.every_instances().chain(node.some_instances()) {
        check_consistent(instance)?;
    }
    Ok(())
}

fn sorted_errors(tree: &ValidationTree) -> Vec<String> {
    let mut errors: Vec<String> = tree
        .root()
        .errors()
        .iter()
        .map(|e| serde_json::to_string(e).unwrap_or_default())
        .collect();
    errors.sort();
    errors
}

fn key() -> impl Strategy<Value = Key> {
    prop_oneof![
        (0i64..4).prop_map(Key::Index),
        "[a-z_][a-z0-9_]{0,5}".prop_map(Key::from),
    ]
}

fn render(keys: &[Key]) -> String {
    keys.iter()
        .enumerate()
        .map(|(i, key)| match key {
            Key::Index(n) => format!("[{}]", n),
            Key::Name(s) if i == 0 => s.clone(),
            Key::Name(s) => format!(".{}", s),
        })
        .collect()
}

proptest! {
    #[test]
    fn valid_iff_no_errors(data in form_data()) {
        let mut tree = ValidationTree::new(form());
        let valid = tree.test_root(&data);
        prop_assert_eq!(valid, tree.root().errors().is_empty());
        check_consistent(tree.root())?;
    }

    #[test]
    fn retest_is_idempotent(data in form_data(), other in form_data()) {
        let mut tree = ValidationTree::new(form());
        tree.test_root(&other);
        let first = tree.test_root(&data);
        let first_errors = tree.root().errors().to_vec();
        let second = tree.test_root(&data);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_errors, tree.root().errors().to_vec());
    }

    #[test]
    fn field_retest_matches_full_retest(
        before in form_data(),
        after in form_data(),
        // "name" also feeds the `meta` child, which a field re-test leaves alone.
        field in prop::sample::select(vec!["age", "tags", "contacts"]),
    ) {
        let mut merged = before.clone();
        merged[field] = after[field].clone();

        let mut partial = ValidationTree::new(form());
        partial.test_root(&before);
        let id = partial.get(partial.root_id(), &before, &[Key::from(field)]).unwrap();
        partial.test(id, &merged[field]).unwrap();

        let mut full = ValidationTree::new(form());
        full.test_root(&merged);

        prop_assert_eq!(partial.root().is_valid(), full.root().is_valid());
        prop_assert_eq!(sorted_errors(&partial), sorted_errors(&full));
        check_consistent(partial.root())?;
    }

    #[test]
    fn reset_then_test_matches_fresh_tree(before in form_data(), after in form_data()) {
        let mut reused = ValidationTree::new(form());
        reused.test_root(&before);
        reused.reset(reused.root_id()).unwrap();
        prop_assert!(reused.root().errors().is_empty());
        reused.test_root(&after);

        let mut fresh = ValidationTree::new(form());
        fresh.test_root(&after);
        prop_assert_eq!(reused.root().errors(), fresh.root().errors());
    }

    #[test]
    fn set_then_get_round_trips(keys in prop::collection::vec(key(), 1..5), leaf in any::<i32>()) {
        let mut doc = json!({});
        path::set(&mut doc, &keys, json!(leaf));
        prop_assert_eq!(path::get(&doc, &keys), Some(&json!(leaf)));
    }

    #[test]
    fn compile_reads_rendered_paths(keys in prop::collection::vec(key(), 1..5)) {
        prop_assert_eq!(compile_path(&render(&keys)), keys);
    }
}
