//! Declared types and the capability trait they share.
//!
//! A [`TypeRef`] names the type a slot, field or container element is declared
//! with. Built-in scalars are plain variants; enumerations, records and generic
//! containers carry their declaration behind an [`Arc`] and are compared by
//! identity.
//!
//! Every non-scalar declared type implements [`DeclaredType`]: "can this type
//! accept this raw value" and "construct an instance from this raw value".

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{DeclaredTypeId, TypeName};
use crate::registry::{self, GenericType};
use crate::value::Value;
use crate::TypeError;

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// A declared type that can recognise and construct instances of itself from
/// raw wire values.
///
/// `accepts` must never fail: any fault while inspecting `raw` is reported as
/// `false`. `construct` is strict and reports why `raw` cannot be converted.
pub trait DeclaredType: std::fmt::Debug + Send + Sync {
    /// Identity of this declaration.
    fn id(&self) -> DeclaredTypeId;

    /// Display name used in error messages.
    fn name(&self) -> &str;

    /// Returns `true` if `raw` can be converted into an instance of this type.
    fn accepts(&self, raw: &Value) -> bool;

    /// Converts `raw` into an instance of this type.
    fn construct(&self, raw: &Value) -> Result<Value, TypeError>;
}

// ---------------------------------------------------------------------------
// Type references
// ---------------------------------------------------------------------------

/// The declared type of a slot, field or element.
#[derive(Debug, Clone)]
pub enum TypeRef {
    /// Supertype of every type; accepts any value.
    Any,
    Bool,
    Int,
    Float,
    Str,
    /// An absolute UTC instant.
    Timestamp,
    /// A declared enumeration.
    Enum(EnumType),
    /// A declared structured record.
    Record(Arc<dyn DeclaredType>),
    /// A generic container template or one of its parameterizations.
    Generic(GenericType),
}

static TIMESTAMP_TYPE: TimestampType = TimestampType;

impl TypeRef {
    /// Display name of the type.
    pub fn name(&self) -> &str {
        match self {
            TypeRef::Any => "any",
            TypeRef::Bool => "bool",
            TypeRef::Int => "int",
            TypeRef::Float => "float",
            TypeRef::Str => "str",
            TypeRef::Timestamp => TIMESTAMP_TYPE.name(),
            TypeRef::Enum(e) => e.name().as_str(),
            TypeRef::Record(r) => r.name(),
            TypeRef::Generic(g) => g.name(),
        }
    }

    /// The capability interface of this type, if it has one.
    ///
    /// Plain scalars (`Any`, `Bool`, `Int`, `Float`, `Str`) have none: values
    /// either already are of the type or they are not.
    pub fn declared(&self) -> Option<&dyn DeclaredType> {
        match self {
            TypeRef::Timestamp => Some(&TIMESTAMP_TYPE),
            TypeRef::Enum(e) => Some(e),
            TypeRef::Record(r) => Some(r.as_ref()),
            TypeRef::Generic(g) => Some(g),
            _ => None,
        }
    }

    /// Returns `true` if `value` already is an instance of this type.
    ///
    /// Container values are instances of a generic type when their
    /// parameterization is compatible with it.
    pub fn is_instance(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Any, _) => true,
            (TypeRef::Bool, Value::Bool(_))
            | (TypeRef::Int, Value::Int(_))
            | (TypeRef::Float, Value::Float(_))
            | (TypeRef::Str, Value::Str(_))
            | (TypeRef::Timestamp, Value::Timestamp(_)) => true,
            (TypeRef::Enum(e), Value::Enum(v)) => v.enum_type().id() == e.id(),
            (TypeRef::Record(r), Value::Record(v)) => v.record_type().id() == r.id(),
            (TypeRef::Generic(g), Value::Typed(c)) => {
                registry::is_compatible(&c.generic_type(), g)
            }
            _ => false,
        }
    }

    /// The element acceptance rule shared by containers and field validation.
    ///
    /// A value is admitted if it is already an instance, if it is a label of a
    /// declared enumeration, or if a nested generic or record type accepts it.
    /// Timestamps are admitted only as instances.
    pub fn admits(&self, value: &Value) -> bool {
        if self.is_instance(value) {
            return true;
        }
        match self {
            TypeRef::Enum(e) => e.accepts(value),
            TypeRef::Generic(g) => g.is_acceptable(value),
            TypeRef::Record(r) => r.accepts(value),
            _ => false,
        }
    }

    /// Returns `true` if every instance of `self` is also an instance of `broader`.
    pub fn is_subtype_of(&self, broader: &TypeRef) -> bool {
        registry::is_subtype(self, broader)
    }

    /// Returns `true` if values of this type can be used as mapping keys.
    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            TypeRef::Any
                | TypeRef::Bool
                | TypeRef::Int
                | TypeRef::Str
                | TypeRef::Timestamp
                | TypeRef::Enum(_)
        )
    }
}

impl PartialEq for TypeRef {
    /// Identity comparison: the same built-in, or the same declaration.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRef::Any, TypeRef::Any)
            | (TypeRef::Bool, TypeRef::Bool)
            | (TypeRef::Int, TypeRef::Int)
            | (TypeRef::Float, TypeRef::Float)
            | (TypeRef::Str, TypeRef::Str)
            | (TypeRef::Timestamp, TypeRef::Timestamp) => true,
            (TypeRef::Enum(a), TypeRef::Enum(b)) => a.id() == b.id(),
            (TypeRef::Record(a), TypeRef::Record(b)) => a.id() == b.id(),
            (TypeRef::Generic(a), TypeRef::Generic(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<EnumType> for TypeRef {
    fn from(e: EnumType) -> Self {
        TypeRef::Enum(e)
    }
}

impl From<GenericType> for TypeRef {
    fn from(g: GenericType) -> Self {
        TypeRef::Generic(g)
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// A declared enumeration: a named, ordered set of labels.
///
/// Raw values are labels (strings); a label is accepted if the enumeration
/// declares it. Cloning shares the declaration.
#[derive(Debug, Clone)]
pub struct EnumType(Arc<EnumDecl>);

#[derive(Debug)]
struct EnumDecl {
    id: DeclaredTypeId,
    name: TypeName,
    labels: Vec<String>,
}

impl EnumType {
    /// Declares a new enumeration.
    ///
    /// Returns `None` if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Option<Self> {
        Some(Self(Arc::new(EnumDecl {
            id: DeclaredTypeId::new_random(),
            name: TypeName::new(name)?,
            labels: labels.into_iter().map(Into::into).collect(),
        })))
    }

    /// Identity of this enumeration.
    pub fn id(&self) -> DeclaredTypeId {
        self.0.id
    }

    /// Name of this enumeration.
    pub fn name(&self) -> &TypeName {
        &self.0.name
    }

    /// Declared labels in declaration order.
    pub fn labels(&self) -> &[String] {
        &self.0.labels
    }

    /// Returns the member with the given label, if declared.
    pub fn member(&self, label: &str) -> Option<EnumValue> {
        let index = self.0.labels.iter().position(|l| l == label)?;
        Some(EnumValue {
            ty: self.clone(),
            index,
        })
    }
}

impl DeclaredType for EnumType {
    fn id(&self) -> DeclaredTypeId {
        self.0.id
    }

    fn name(&self) -> &str {
        self.0.name.as_str()
    }

    fn accepts(&self, raw: &Value) -> bool {
        matches!(raw, Value::Str(label) if self.member(label).is_some())
    }

    fn construct(&self, raw: &Value) -> Result<Value, TypeError> {
        match raw {
            Value::Enum(v) if v.ty.id() == self.id() => Ok(raw.clone()),
            Value::Str(label) => self
                .member(label)
                .map(Value::Enum)
                .ok_or_else(|| coercion_error(DeclaredType::name(self), raw)),
            _ => Err(coercion_error(DeclaredType::name(self), raw)),
        }
    }
}

/// A member of a declared enumeration.
#[derive(Debug, Clone)]
pub struct EnumValue {
    ty: EnumType,
    index: usize,
}

impl EnumValue {
    /// The member's label.
    pub fn label(&self) -> &str {
        &self.ty.labels()[self.index]
    }

    /// Position of the member in its enumeration's declaration order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The enumeration this member belongs to.
    pub fn enum_type(&self) -> &EnumType {
        &self.ty
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.ty.id() == other.ty.id() && self.index == other.index
    }
}

impl Eq for EnumValue {}

impl std::hash::Hash for EnumValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ty.id().hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for EnumValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EnumValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.ty.id(), self.index).cmp(&(other.ty.id(), other.index))
    }
}

impl std::fmt::Display for EnumValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.ty.name(), self.label())
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Local date/time component of the wire timestamp format; it is followed by
/// a `±HHMM` offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Parses a wire timestamp such as `2021-06-01T10:15:00+0200`.
    ///
    /// The instant is the local date/time with the stated offset added to it,
    /// so the example above yields `2021-06-01T12:15:00Z`.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let invalid = || coercion_error(TIMESTAMP_TYPE.name(), &Value::Str(raw.to_string()));

        let stated = DateTime::<FixedOffset>::parse_from_str(raw, WIRE_FORMAT).map_err(|_| invalid())?;
        let shift = chrono::Duration::seconds(i64::from(stated.offset().local_minus_utc()));
        let instant = stated
            .naive_local()
            .checked_add_signed(shift)
            .ok_or_else(invalid)?;
        Ok(Self(Utc.from_utc_datetime(&instant)))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+0000", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// Capability interface of [`TypeRef::Timestamp`].
#[derive(Debug)]
pub struct TimestampType;

impl DeclaredType for TimestampType {
    fn id(&self) -> DeclaredTypeId {
        DeclaredTypeId::builtin(1)
    }

    fn name(&self) -> &str {
        "timestamp"
    }

    fn accepts(&self, raw: &Value) -> bool {
        matches!(raw, Value::Str(s) if Timestamp::parse(s).is_ok())
    }

    fn construct(&self, raw: &Value) -> Result<Value, TypeError> {
        match raw {
            Value::Timestamp(_) => Ok(raw.clone()),
            Value::Str(s) => Timestamp::parse(s).map(Value::Timestamp),
            _ => Err(coercion_error(self.name(), raw)),
        }
    }
}

pub(crate) fn coercion_error(type_name: &str, raw: &Value) -> TypeError {
    TypeError::Coercion {
        type_name: type_name.to_string(),
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn status() -> EnumType {
        EnumType::new("Status", ["RUNNING", "STOPPED"]).expect("enum")
    }

    #[test]
    fn enum_accepts_declared_labels_only() {
        let status = status();
        assert!(status.accepts(&Value::from("RUNNING")));
        assert!(!status.accepts(&Value::from("PAUSED")));
        assert!(!status.accepts(&Value::Int(0)));
    }

    #[test]
    fn enum_construct_keeps_identity() {
        let status = status();
        let member = status.construct(&Value::from("STOPPED")).expect("member");
        assert!(TypeRef::Enum(status.clone()).is_instance(&member));
        assert_eq!(member, Value::Enum(status.member("STOPPED").expect("member")));
    }

    #[test]
    fn enum_construct_rejects_unknown_label() {
        let err = status().construct(&Value::from("PAUSED")).unwrap_err();
        assert!(matches!(err, TypeError::Coercion { .. }));
    }

    #[test]
    fn same_named_enums_are_different_types() {
        let a = TypeRef::Enum(status());
        let b = TypeRef::Enum(status());
        assert_ne!(a, b);
        assert!(!a.is_subtype_of(&b));
    }

    #[test]
    fn timestamp_adds_stated_offset() {
        let ts = Timestamp::parse("2021-06-01T10:15:00+0200").expect("timestamp");
        let expected = Utc.with_ymd_and_hms(2021, 6, 1, 12, 15, 0).unwrap();
        assert_eq!(ts.as_datetime(), expected);
    }

    #[test]
    fn timestamp_honours_negative_offsets() {
        let ts = Timestamp::parse("2021-06-01T10:15:00-0130").expect("timestamp");
        let expected = Utc.with_ymd_and_hms(2021, 6, 1, 8, 45, 0).unwrap();
        assert_eq!(ts.as_datetime(), expected);
    }

    #[test]
    fn timestamp_offset_can_cross_midnight() {
        let ts = Timestamp::parse("2021-06-01T23:30:00+0100").expect("timestamp");
        let expected = Utc.with_ymd_and_hms(2021, 6, 2, 0, 30, 0).unwrap();
        assert_eq!(ts.as_datetime(), expected);
    }

    #[test]
    fn timestamp_rejects_malformed_input() {
        for raw in ["", "+0200", "2021-06-01 10:15:00+0200", "2021-06-01T10:15:00Z", "2021-06-01T10:15:00"] {
            assert!(Timestamp::parse(raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn timestamp_display_uses_wire_format() {
        let ts = Timestamp::parse("2021-06-01T10:15:00+0000").expect("timestamp");
        assert_eq!(ts.to_string(), "2021-06-01T10:15:00+0000");
    }

    #[test]
    fn hashable_types_are_scalars_and_enums() {
        assert!(TypeRef::Str.is_hashable());
        assert!(TypeRef::Enum(status()).is_hashable());
        assert!(!TypeRef::Float.is_hashable());
    }
}
