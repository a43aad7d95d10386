//! Raw and typed values.
//!
//! [`Value`] carries both the untyped wire shape (null, booleans, numbers,
//! strings, sequences, mappings) and typed values (enumeration members,
//! timestamps, records, generic containers). [`Value::to_plain`] strips the
//! typed layer back off, and [`Value::to_json`] renders the plain form as
//! JSON for a request body.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::container::Container;
use crate::types::{DeclaredType, EnumValue, Timestamp};

// ---------------------------------------------------------------------------
// Mapping keys
// ---------------------------------------------------------------------------

/// A hashable value usable as a mapping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Str(String),
    Enum(EnumValue),
    Timestamp(Timestamp),
}

impl Key {
    /// Converts a value into a key, or returns `None` if the value is not
    /// hashable.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Enum(e) => Some(Key::Enum(e.clone())),
            Value::Timestamp(t) => Some(Key::Timestamp(*t)),
            _ => None,
        }
    }

    /// The key as a value.
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    /// The key as a plain value (enumeration members become labels,
    /// timestamps become wire strings).
    pub fn to_plain(&self) -> Key {
        match self {
            Key::Enum(e) => Key::Str(e.label().to_string()),
            Key::Timestamp(t) => Key::Str(t.to_string()),
            other => other.clone(),
        }
    }
}

impl From<Key> for Value {
    fn from(key: Key) -> Self {
        match key {
            Key::Bool(b) => Value::Bool(b),
            Key::Int(i) => Value::Int(i),
            Key::Str(s) => Value::Str(s),
            Key::Enum(e) => Value::Enum(e),
            Key::Timestamp(t) => Value::Timestamp(t),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => write!(f, "{s}"),
            Key::Enum(e) => write!(f, "{}", e.label()),
            Key::Timestamp(t) => write!(f, "{t}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An instance of a declared structured record type.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<dyn DeclaredType>,
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates a record of type `ty` holding `fields`.
    ///
    /// Callers are the record type's own constructors; no validation is
    /// performed here.
    pub fn new(ty: Arc<dyn DeclaredType>, fields: BTreeMap<String, Value>) -> Self {
        Self { ty, fields }
    }

    /// The declared type of this record.
    pub fn record_type(&self) -> &Arc<dyn DeclaredType> {
        &self.ty
    }

    /// Value of the named field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All present fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ty.id() == other.ty.id() && self.fields == other.fields
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A raw wire value or a typed value.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absent-value marker.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A raw ordered sequence.
    Seq(Vec<Value>),
    /// A raw keyed mapping.
    Map(BTreeMap<Key, Value>),
    Enum(EnumValue),
    Timestamp(Timestamp),
    Record(Record),
    /// A generic container.
    Typed(Container),
}

impl Value {
    /// Name of this value's type, as used in mismatch reports.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::Seq(_) => "list".to_string(),
            Value::Map(_) => "dict".to_string(),
            Value::Enum(e) => e.enum_type().name().to_string(),
            Value::Timestamp(_) => "timestamp".to_string(),
            Value::Record(r) => r.record_type().name().to_string(),
            Value::Typed(c) => c.type_name().to_string(),
        }
    }

    /// Returns `true` for the absent-value marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Recursively strips the typed layer, leaving only null, booleans,
    /// numbers, strings, sequences and mappings.
    pub fn to_plain(&self) -> Value {
        match self {
            Value::Seq(items) => Value::Seq(items.iter().map(Value::to_plain).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_plain(), v.to_plain()))
                    .collect(),
            ),
            Value::Enum(e) => Value::Str(e.label().to_string()),
            Value::Timestamp(t) => Value::Str(t.to_string()),
            Value::Record(r) => Value::Map(
                r.fields
                    .iter()
                    .map(|(k, v)| (Key::Str(k.clone()), v.to_plain()))
                    .collect(),
            ),
            Value::Typed(c) => c.to_plain(),
            scalar => scalar.clone(),
        }
    }

    /// Renders the plain form of this value as JSON. Mapping keys are
    /// rendered as strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self.to_plain() {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            // `to_plain` never yields typed variants.
            _ => serde_json::Value::Null,
        }
    }

    /// Compares two values by their natural order, or returns `None` if they
    /// have none.
    ///
    /// Numbers compare numerically across `Int` and `Float`; sequences and
    /// sequence containers compare lexicographically; mappings, records,
    /// enumeration members and nulls are unordered.
    pub fn try_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Seq(a), Value::Seq(b)) => cmp_sequences(a, b),
            (Value::Typed(c), other) => c.compare(other).ok(),
            (Value::Seq(_), Value::Typed(c)) => c.compare(self).ok().map(Ordering::reverse),
            _ => None,
        }
    }

    /// Elements of a raw sequence or any container, for bulk operations.
    pub(crate) fn elements(&self) -> Option<Vec<Cow<'_, Value>>> {
        match self {
            Value::Seq(items) => Some(items.iter().map(Cow::Borrowed).collect()),
            Value::Map(entries) => Some(entries.keys().map(|k| Cow::Owned(k.to_value())).collect()),
            Value::Typed(c) => c.iter().ok().map(Iterator::collect),
            _ => None,
        }
    }
}

pub(crate) fn cmp_sequences(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        match x.try_cmp(y)? {
            Ordering::Equal => continue,
            unequal => return Some(unequal),
        }
    }
    Some(a.len().cmp(&b.len()))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Typed(a), Value::Typed(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Seq(items) => fmt_seq(f, items),
            Value::Map(entries) => fmt_map(f, entries),
            Value::Enum(e) => write!(f, "{e}"),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Record(r) => write!(f, "{}{}", r.ty.name(), self.to_plain()),
            Value::Typed(c) => write!(f, "{c}"),
        }
    }
}

pub(crate) fn fmt_seq(f: &mut std::fmt::Formatter<'_>, items: &[Value]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

pub(crate) fn fmt_map(
    f: &mut std::fmt::Formatter<'_>,
    entries: &BTreeMap<Key, Value>,
) -> std::fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in entries.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {v}", k.to_value())?;
    }
    write!(f, "}}")
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Decodes a JSON document into raw values.
///
/// Integers that fit in `i64` become [`Value::Int`]. Larger unsigned integers
/// have no exact representation and become the nearest [`Value::Float`].
/// Object keys are always strings.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::Seq(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Key::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

impl From<BTreeMap<Key, Value>> for Value {
    fn from(entries: BTreeMap<Key, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<EnumValue> for Value {
    fn from(e: EnumValue) -> Self {
        Value::Enum(e)
    }
}

impl From<Timestamp> for Value {
    fn from(t: Timestamp) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Typed(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_string_keyed_maps() {
        let value = Value::from(json!({"a": 1, "b": [true, null, 1.5]}));
        let Value::Map(entries) = &value else {
            panic!("expected a map, got {value}");
        };
        assert_eq!(entries.get(&Key::from("a")), Some(&Value::Int(1)));
        assert_eq!(
            entries.get(&Key::from("b")),
            Some(&Value::Seq(vec![Value::Bool(true), Value::Null, Value::Float(1.5)]))
        );
    }

    #[test]
    fn integers_beyond_i64_become_floats() {
        assert_eq!(Value::from(json!(i64::MAX)), Value::Int(i64::MAX));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Float(u64::MAX as f64));
        assert!(matches!(Value::from(json!(u64::MAX)), Value::Float(_)));
    }

    #[test]
    fn json_round_trips_through_plain_form() {
        let raw = json!({"name": "vm", "cpus": 2, "tags": ["a", "b"], "ram": 1.5});
        assert_eq!(Value::from(raw.clone()).to_json(), raw);
    }

    #[test]
    fn non_string_keys_render_as_strings() {
        let mut entries = BTreeMap::new();
        entries.insert(Key::Int(1), Value::Int(3));
        assert_eq!(Value::Map(entries).to_json(), json!({"1": 3}));
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Int(1).try_cmp(&Value::Float(1.5)), Some(Ordering::Less));
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = Value::from(json!([1, 2]));
        let b = Value::from(json!([1, 3]));
        assert_eq!(a.try_cmp(&b), Some(Ordering::Less));
        assert_eq!(b.try_cmp(&Value::from(json!([1, 3, 0]))), Some(Ordering::Less));
    }

    #[test]
    fn mappings_and_nulls_are_unordered() {
        assert_eq!(Value::from(json!({})).try_cmp(&Value::from(json!({}))), None);
        assert_eq!(Value::Null.try_cmp(&Value::Null), None);
        assert_eq!(Value::from(json!([1, null])).try_cmp(&Value::from(json!([1, 2]))), None);
    }

    #[test]
    fn floats_and_containers_are_not_keys() {
        assert!(Key::from_value(&Value::Float(1.0)).is_none());
        assert!(Key::from_value(&Value::Seq(vec![])).is_none());
        assert_eq!(Key::from_value(&Value::Int(4)), Some(Key::Int(4)));
    }

    #[test]
    fn serde_uses_the_plain_json_form() {
        let value: Value = serde_json::from_str(r#"{"a": [1, "x"]}"#).expect("deserialize");
        assert_eq!(serde_json::to_string(&value).expect("serialize"), r#"{"a":[1,"x"]}"#);
    }
}
