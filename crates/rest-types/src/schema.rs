//! Field-level validation of raw records against a declared schema.
//!
//! A schema is three tables: every field name the record may carry, the
//! required subset, and the declared type of each field. [`validate_fields`]
//! checks a raw mapping against them and reports every problem at once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use typed::{FieldMismatch, Key, TypeError, TypeRef, Value};

use crate::coerce::is_acceptable;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

mod defaults {
    pub const fn allow_missing_as_none() -> bool {
        true
    }

    pub const fn reject_additional() -> bool {
        true
    }
}

/// How strictly a record is checked against its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaPolicy {
    /// Treat a field explicitly set to null as absent rather than as a value
    /// of the wrong type.
    #[serde(default = "defaults::allow_missing_as_none")]
    pub allow_missing_as_none: bool,

    /// Report fields that the schema does not declare.
    #[serde(default = "defaults::reject_additional")]
    pub reject_additional: bool,
}

impl Default for SchemaPolicy {
    fn default() -> Self {
        Self {
            allow_missing_as_none: defaults::allow_missing_as_none(),
            reject_additional: defaults::reject_additional(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Field names present on a raw record. Anything that is not a mapping has no
/// fields.
pub(crate) fn given_fields(given: &Value) -> BTreeMap<String, &Value> {
    match given {
        Value::Map(entries) => entries.iter().map(|(k, v)| (field_name(k), v)).collect(),
        Value::Record(record) => record.fields().iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Typed(container) => match container.items() {
            Ok(items) => items.map(|(k, v)| (field_name(k), v)).collect(),
            Err(_) => BTreeMap::new(),
        },
        _ => BTreeMap::new(),
    }
}

/// Raw maps and mapping containers.
pub(crate) fn is_mapping(given: &Value) -> bool {
    match given {
        Value::Map(_) => true,
        Value::Typed(container) => container.items().is_ok(),
        _ => false,
    }
}

fn field_name(key: &Key) -> String {
    match key {
        Key::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Checks `given` against a schema.
///
/// - missing: required fields absent from `given`;
/// - additional: fields of `given` not in `all_fields` (reported only when the
///   policy rejects them);
/// - mismatches: declared fields whose value the declared type does not
///   accept, as (actual, expected) type names. Null values are skipped when
///   the policy allows them. A field without a declared type accepts anything.
///
/// All three are collected before a [`TypeError::SchemaMismatch`] is returned.
pub fn validate_fields(
    given: &Value,
    all_fields: &BTreeSet<String>,
    required_fields: &BTreeSet<String>,
    field_types: &BTreeMap<String, TypeRef>,
    policy: &SchemaPolicy,
) -> Result<(), TypeError> {
    let present = given_fields(given);

    let missing: BTreeSet<String> = required_fields
        .iter()
        .filter(|f| !present.contains_key(*f))
        .cloned()
        .collect();

    let additional: BTreeSet<String> = if policy.reject_additional {
        present
            .keys()
            .filter(|f| !all_fields.contains(*f))
            .cloned()
            .collect()
    } else {
        BTreeSet::new()
    };

    let mismatches: Vec<FieldMismatch> = present
        .iter()
        .filter(|(field, _)| all_fields.contains(*field))
        .filter_map(|(field, value)| {
            let ty = field_types.get(field)?;
            if is_acceptable(value, ty, policy.allow_missing_as_none) {
                return None;
            }
            Some(FieldMismatch {
                field: field.clone(),
                actual: value.type_name(),
                expected: ty.name().to_string(),
            })
        })
        .collect();

    if missing.is_empty() && additional.is_empty() && mismatches.is_empty() {
        return Ok(());
    }

    tracing::debug!(
        missing = missing.len(),
        additional = additional.len(),
        mismatches = mismatches.len(),
        "field validation failed"
    );
    Err(TypeError::SchemaMismatch {
        missing,
        additional,
        mismatches,
    })
}
