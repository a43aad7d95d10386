//! Validation and coercion of decoded payloads.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};
use rest_types::{coerce, is_acceptable, validate_fields, RecordSchema, SchemaPolicy};
use serde_json::json;
use typed::{dict, list, DeclaredType, EnumType, FieldMismatch, TypeError, TypeName, TypeRef, Value};

fn names(fields: &[&str]) -> BTreeSet<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn types(entries: &[(&str, TypeRef)]) -> BTreeMap<String, TypeRef> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn missing_required_fields_are_reported() {
    let given = Value::from(json!({"a": 1, "b": "x"}));
    let err = validate_fields(
        &given,
        &names(&["a", "b", "c"]),
        &names(&["a", "c"]),
        &types(&[("a", TypeRef::Int), ("b", TypeRef::Str), ("c", TypeRef::Int)]),
        &SchemaPolicy::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        TypeError::SchemaMismatch {
            missing: names(&["c"]),
            additional: BTreeSet::new(),
            mismatches: Vec::new(),
        }
    );
}

#[test]
fn every_category_is_collected() {
    let given = Value::from(json!({"a": 1, "b": "x"}));
    let err = validate_fields(
        &given,
        &names(&["a", "b", "c"]),
        &names(&["a", "c"]),
        &types(&[("a", TypeRef::Int), ("b", TypeRef::Int), ("c", TypeRef::Int)]),
        &SchemaPolicy::default(),
    )
    .unwrap_err();
    let TypeError::SchemaMismatch {
        missing,
        additional,
        mismatches,
    } = err
    else {
        panic!("expected a schema mismatch");
    };
    assert_eq!(missing, names(&["c"]));
    assert!(additional.is_empty());
    assert_eq!(
        mismatches,
        vec![FieldMismatch {
            field: "b".to_string(),
            actual: "str".to_string(),
            expected: "int".to_string(),
        }]
    );
}

#[test]
fn mismatch_message_names_each_category() {
    let err = validate_fields(
        &Value::from(json!({"b": "x", "z": 0})),
        &names(&["b"]),
        &names(&["a"]),
        &types(&[("b", TypeRef::Int)]),
        &SchemaPolicy::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "schema mismatch; missing: {a}, additional: {z}, types (got, expected): {b: (str, int)}"
    );
}

#[test]
fn enum_labels_and_nested_containers_validate() {
    let status = EnumType::new("Status", ["ACTIVE", "STOPPED"]).expect("enum");
    let field_types = types(&[
        ("status", TypeRef::from(status)),
        ("tags", TypeRef::from(list(TypeRef::Str).expect("list[str]"))),
        (
            "limits",
            TypeRef::from(dict(TypeRef::Str, TypeRef::Int).expect("dict")),
        ),
    ]);
    let all = names(&["status", "tags", "limits"]);
    let good = Value::from(json!({"status": "ACTIVE", "tags": ["a"], "limits": {"cpu": 2}}));
    validate_fields(&good, &all, &all, &field_types, &SchemaPolicy::default()).expect("valid");

    let bad = Value::from(json!({"status": "PAUSED", "tags": [1], "limits": {"cpu": "2"}}));
    let err = validate_fields(&bad, &all, &all, &field_types, &SchemaPolicy::default()).unwrap_err();
    assert!(matches!(err, TypeError::SchemaMismatch { ref mismatches, .. } if mismatches.len() == 3));
}

#[test]
fn timestamps_coerce_with_their_offset() {
    let raw = Value::from("2021-06-01T10:15:00+0200");
    assert!(is_acceptable(&raw, &TypeRef::Timestamp, false));
    let Some(Value::Timestamp(ts)) = coerce(&raw, &TypeRef::Timestamp, false).expect("coerce") else {
        panic!("expected a timestamp");
    };
    let expected = Utc.with_ymd_and_hms(2021, 6, 1, 12, 15, 0).single().expect("instant");
    assert_eq!(ts.as_datetime(), expected);
    assert_eq!(Value::Timestamp(ts).to_json(), json!("2021-06-01T12:15:00+0000"));
}

#[test]
fn malformed_timestamps_fail_to_coerce() {
    let err = coerce(&Value::from("01/06/2021"), &TypeRef::Timestamp, false).unwrap_err();
    assert!(matches!(err, TypeError::Coercion { ref type_name, .. } if type_name == "timestamp"));
}

#[test]
fn records_round_trip_to_plain_payloads() {
    let status = EnumType::new("Status", ["ACTIVE", "STOPPED"]).expect("enum");
    let server = RecordSchema::new(TypeName::new("Server").expect("name"))
        .field("name", TypeRef::Str, true)
        .field("status", TypeRef::from(status), true)
        .field("disks", TypeRef::from(list(TypeRef::Int).expect("list[int]")), false)
        .build();

    let payload = json!({"name": "vm-1", "status": "ACTIVE", "disks": [20, 40]});
    let value = server.construct(&Value::from(payload.clone())).expect("construct");
    assert!(server.type_ref().is_instance(&value));
    assert_eq!(value.to_json(), payload);
}

#[test]
fn records_nest_inside_containers() {
    let server = RecordSchema::new(TypeName::new("Server").expect("name"))
        .field("name", TypeRef::Str, true)
        .build();
    let servers = list(server.type_ref()).expect("list[Server]");
    let payload = json!([{"name": "a"}, {"name": "b"}]);

    assert!(servers.is_acceptable(&Value::from(payload.clone())));
    let container = servers.instantiate(Value::from(payload.clone())).expect("construct");
    assert_eq!(container.to_plain().to_json(), payload);
    assert!(!servers.is_acceptable(&Value::from(json!([{"name": 1}]))));
}

#[test]
fn policy_loads_from_json() {
    let policy: SchemaPolicy =
        serde_json::from_value(json!({"allow_missing_as_none": false})).expect("policy");
    let server = RecordSchema::new(TypeName::new("Server").expect("name"))
        .field("name", TypeRef::Str, false)
        .policy(policy)
        .build();
    assert!(!server.accepts(&Value::from(json!({"name": null}))));
    assert!(server.accepts(&Value::from(json!({}))));
}
