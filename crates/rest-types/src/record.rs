//! Declared structured record types.
//!
//! A [`RecordSchema`] names a record and its fields; building it yields a
//! [`RecordType`], which plugs into the type system through
//! [`DeclaredType`]. Records can therefore be fields of other records and
//! items of typed containers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use typed::{DeclaredType, DeclaredTypeId, Record, TypeError, TypeName, TypeRef, Value};

use crate::coerce::coerce;
use crate::schema::{given_fields, is_mapping, validate_fields, SchemaPolicy};

// ---------------------------------------------------------------------------
// Declaration
// ---------------------------------------------------------------------------

/// Builder for a [`RecordType`].
#[derive(Debug, Clone)]
pub struct RecordSchema {
    name: TypeName,
    types: BTreeMap<String, TypeRef>,
    required: BTreeSet<String>,
    policy: SchemaPolicy,
}

impl RecordSchema {
    pub fn new(name: TypeName) -> Self {
        Self {
            name,
            types: BTreeMap::new(),
            required: BTreeSet::new(),
            policy: SchemaPolicy::default(),
        }
    }

    /// Declares a field. Declaring the same name again replaces it.
    pub fn field(mut self, name: impl Into<String>, ty: TypeRef, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.insert(name.clone());
        } else {
            self.required.remove(&name);
        }
        self.types.insert(name, ty);
        self
    }

    pub fn policy(mut self, policy: SchemaPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> RecordType {
        RecordType(Arc::new(RecordDecl {
            id: DeclaredTypeId::new_random(),
            all: self.types.keys().cloned().collect(),
            name: self.name,
            types: self.types,
            required: self.required,
            policy: self.policy,
        }))
    }
}

// ---------------------------------------------------------------------------
// Record type
// ---------------------------------------------------------------------------

/// A declared record type. Cloning shares the declaration and its identity.
#[derive(Debug, Clone)]
pub struct RecordType(Arc<RecordDecl>);

#[derive(Debug)]
struct RecordDecl {
    id: DeclaredTypeId,
    name: TypeName,
    all: BTreeSet<String>,
    required: BTreeSet<String>,
    types: BTreeMap<String, TypeRef>,
    policy: SchemaPolicy,
}

impl RecordType {
    /// This record type as a field or item type.
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::Record(Arc::new(self.clone()))
    }

    pub fn fields(&self) -> &BTreeSet<String> {
        &self.0.all
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.0.required
    }

    pub fn field_type(&self, field: &str) -> Option<&TypeRef> {
        self.0.types.get(field)
    }

    pub fn policy(&self) -> &SchemaPolicy {
        &self.0.policy
    }

    /// Checks a raw record against this type's schema.
    pub fn validate(&self, raw: &Value) -> Result<(), TypeError> {
        let decl = &self.0;
        validate_fields(raw, &decl.all, &decl.required, &decl.types, &decl.policy)
    }

    fn is_own(&self, raw: &Value) -> bool {
        matches!(raw, Value::Record(r) if r.record_type().id() == self.0.id)
    }
}

impl DeclaredType for RecordType {
    fn id(&self) -> DeclaredTypeId {
        self.0.id
    }

    fn name(&self) -> &str {
        self.0.name.as_str()
    }

    fn accepts(&self, raw: &Value) -> bool {
        self.is_own(raw) || (is_mapping(raw) && self.validate(raw).is_ok())
    }

    /// Validates `raw`, then coerces each declared field present in it.
    /// Undeclared fields are dropped; explicit nulls are kept when the policy
    /// allows them.
    fn construct(&self, raw: &Value) -> Result<Value, TypeError> {
        if self.is_own(raw) {
            return Ok(raw.clone());
        }
        if !is_mapping(raw) {
            return Err(TypeError::Coercion {
                type_name: self.0.name.to_string(),
                value: raw.to_string(),
            });
        }
        self.validate(raw)?;

        let allow_missing = self.0.policy.allow_missing_as_none;
        let mut fields = BTreeMap::new();
        for (field, value) in given_fields(raw) {
            if !self.0.all.contains(&field) {
                continue;
            }
            let coerced = match self.0.types.get(&field) {
                Some(ty) => coerce(value, ty, allow_missing)?.unwrap_or(Value::Null),
                None => value.clone(),
            };
            fields.insert(field, coerced);
        }
        Ok(Value::Record(Record::new(Arc::new(self.clone()), fields)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typed::Timestamp;

    fn server() -> RecordType {
        RecordSchema::new(TypeName::new("Server").expect("name"))
            .field("name", TypeRef::Str, true)
            .field("cpus", TypeRef::Int, false)
            .field("created", TypeRef::Timestamp, false)
            .build()
    }

    fn raw(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (typed::Key::from(*k), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn construct_coerces_each_field() {
        let value = server()
            .construct(&raw(&[
                ("name", Value::from("vm")),
                ("created", Value::from("2021-06-01T10:15:00+0200")),
            ]))
            .expect("construct");
        let Value::Record(record) = &value else {
            panic!("expected a record");
        };
        assert_eq!(record.get("name"), Some(&Value::from("vm")));
        let expected = Timestamp::parse("2021-06-01T12:15:00+0000").expect("timestamp");
        assert_eq!(record.get("created"), Some(&Value::Timestamp(expected)));
        assert_eq!(record.get("cpus"), None);
    }

    #[test]
    fn records_are_instances_of_their_own_type_only() {
        let ty = server();
        let value = ty.construct(&raw(&[("name", Value::from("vm"))])).expect("construct");
        assert!(ty.type_ref().is_instance(&value));
        assert!(!server().type_ref().is_instance(&value));
        assert_eq!(ty.construct(&value).expect("identity"), value);
    }

    #[test]
    fn accepts_mirrors_validation() {
        let ty = server();
        assert!(ty.accepts(&raw(&[("name", Value::from("vm"))])));
        assert!(!ty.accepts(&raw(&[("cpus", Value::Int(2))])));
        assert!(!ty.accepts(&raw(&[("name", Value::from("vm")), ("disk", Value::Int(2))])));
        assert!(!ty.accepts(&Value::from("vm")));
    }

    #[test]
    fn construct_reports_schema_mismatch() {
        let err = server()
            .construct(&raw(&[("name", Value::Int(1))]))
            .unwrap_err();
        assert!(matches!(err, TypeError::SchemaMismatch { ref mismatches, .. } if mismatches.len() == 1));
    }

    #[test]
    fn mapping_containers_construct_records() {
        let ty = typed::dict(TypeRef::Str, TypeRef::Any).expect("dict");
        let map = ty
            .instantiate(raw(&[("name", Value::from("vm")), ("cpus", Value::Int(4))]))
            .expect("construct");
        let value = server().construct(&Value::Typed(map)).expect("record");
        let Value::Record(record) = &value else {
            panic!("expected a record");
        };
        assert_eq!(record.get("cpus"), Some(&Value::Int(4)));
    }

    #[test]
    fn redeclared_fields_replace_earlier_ones() {
        let ty = RecordSchema::new(TypeName::new("Disk").expect("name"))
            .field("size", TypeRef::Int, true)
            .field("size", TypeRef::Float, false)
            .build();
        assert_eq!(ty.field_type("size"), Some(&TypeRef::Float));
        assert!(ty.required().is_empty());
        assert_eq!(ty.fields().len(), 1);
    }
}
