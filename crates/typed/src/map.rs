//! The typed mapping: a container keyed by `key_type` holding `item_type`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::container::{
    admits_element, base_template, coerce_element, declared_element_type, not_found_key, Container,
    Store, ITEM_TYPE,
};
use crate::identifiers::SlotName;
use crate::registry::{GenericType, StoreKind, Template};
use crate::slot::{FieldSlot, SlotConstraint};
use crate::value::{Key, Value};
use crate::TypeError;

/// Slot holding the key type of a mapping.
pub const KEY_TYPE: &str = "key_type";

/// The built-in `Map` template with slots `key_type` (hashable) and
/// `item_type`.
pub fn template() -> Arc<Template> {
    static MAP: OnceLock<Arc<Template>> = OnceLock::new();
    Arc::clone(MAP.get_or_init(|| {
        Template::builtin(
            "Map",
            StoreKind::Mapping,
            Some(base_template()),
            vec![
                FieldSlot::new(SlotName::from_trusted(KEY_TYPE)).with_constraint(SlotConstraint::Hashable),
                FieldSlot::new(SlotName::from_trusted(ITEM_TYPE)),
            ],
        )
    }))
}

pub(crate) fn is_acceptable(generic: &GenericType, raw: &Value) -> bool {
    let (Some(key_type), Some(item_type)) = (
        declared_element_type(generic, KEY_TYPE),
        declared_element_type(generic, ITEM_TYPE),
    ) else {
        return false;
    };
    let entries = match raw {
        Value::Map(entries) => entries,
        Value::Typed(c) => match &c.store {
            Store::Mapping(entries) => entries,
            _ => return false,
        },
        _ => return false,
    };
    let noneable = generic.noneable();
    entries
        .iter()
        .all(|(k, v)| key_type.admits(&k.to_value()) && admits_element(item_type, noneable, v))
}

impl Container {
    /// Keys in order.
    pub fn keys(&self) -> Result<impl Iterator<Item = &Key> + '_, TypeError> {
        Ok(self.mapping("keys")?.keys())
    }

    /// Items in key order.
    pub fn values(&self) -> Result<impl Iterator<Item = &Value> + '_, TypeError> {
        Ok(self.mapping("values")?.values())
    }

    /// Entries in key order.
    pub fn items(&self) -> Result<impl Iterator<Item = (&Key, &Value)> + '_, TypeError> {
        Ok(self.mapping("items")?.iter())
    }

    /// The item stored under `key`, if any. Unhashable keys are never present.
    pub fn get(&self, key: &Value) -> Result<Option<&Value>, TypeError> {
        let entries = self.mapping("get")?;
        Ok(Key::from_value(key).and_then(|k| entries.get(&k)))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool, TypeError> {
        Ok(self.get(key)?.is_some())
    }

    /// Merges the entries of a raw mapping or mapping container.
    ///
    /// Keys and items are coerced into the declared types. If any entry fails
    /// nothing is inserted.
    pub fn update(&mut self, raw: &Value) -> Result<(), TypeError> {
        let key_type = self.element_type(KEY_TYPE).clone();
        let item_type = self.element_type(ITEM_TYPE).clone();
        let noneable = self.noneable();
        self.mapping("update")?;

        let entries = match raw {
            Value::Map(entries) => entries,
            Value::Typed(c) => c.mapping("update")?,
            other => return Err(TypeError::mismatch("dict", other.type_name())),
        };

        let staged = entries
            .iter()
            .map(|(k, v)| {
                let key = coerce_element(&key_type, false, &k.to_value())?;
                let key = Key::from_value(&key)
                    .ok_or_else(|| TypeError::mismatch(key_type.name(), key.type_name()))?;
                Ok((key, coerce_element(&item_type, noneable, v)?))
            })
            .collect::<Result<Vec<_>, TypeError>>();

        let staged = match staged {
            Ok(staged) => staged,
            Err(err) => {
                tracing::debug!(container = self.type_name(), error = %err, "rejected update");
                return Err(err);
            }
        };
        self.mapping_mut("update")?.extend(staged);
        Ok(())
    }

    /// Removes and returns the item stored under `key`.
    pub fn pop_entry(&mut self, key: &Value) -> Result<Value, TypeError> {
        let entries = self.mapping_mut("pop")?;
        Key::from_value(key)
            .and_then(|k| entries.remove(&k))
            .ok_or_else(|| not_found_key(key))
    }

    /// Removes and returns the entry with the greatest key.
    pub fn pop_item(&mut self) -> Result<(Key, Value), TypeError> {
        self.mapping_mut("pop_item")?
            .pop_last()
            .ok_or_else(|| TypeError::NotFound {
                what: "entry in empty mapping".to_string(),
            })
    }

    /// A new mapping of type `generic` with every key in `keys` mapped to
    /// `fill`.
    pub fn from_keys(
        generic: &GenericType,
        keys: impl IntoIterator<Item = Value>,
        fill: Value,
    ) -> Result<Container, TypeError> {
        if generic.store() != StoreKind::Mapping {
            return Err(TypeError::unsupported("from_keys", generic.name()));
        }
        let mut raw = BTreeMap::new();
        for key in keys {
            let k = Key::from_value(&key)
                .ok_or_else(|| TypeError::mismatch("hashable key", key.type_name()))?;
            raw.insert(k, fill.clone());
        }
        generic.instantiate(Value::Map(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::dict;
    use crate::types::{EnumType, TypeRef};
    use serde_json::json;

    fn str_int() -> GenericType {
        dict(TypeRef::Str, TypeRef::Int).expect("dict")
    }

    #[test]
    fn accepts_matching_raw_mappings() {
        let ty = str_int();
        assert!(ty.is_acceptable(&Value::from(json!({"a": 1, "b": null}))));
        assert!(!ty.is_acceptable(&Value::from(json!({"a": "x"}))));
        assert!(!ty.is_acceptable(&Value::from(json!([1]))));
    }

    #[test]
    fn unbound_template_accepts_nothing() {
        let ty = GenericType::Template(template());
        assert!(!ty.is_acceptable(&Value::from(json!({}))));
    }

    #[test]
    fn update_coerces_enum_labels() {
        let status = EnumType::new("Status", ["ON", "OFF"]).expect("enum");
        let ty = dict(TypeRef::Str, TypeRef::from(status.clone())).expect("dict");
        let c = ty.instantiate(Value::from(json!({"vm": "ON"}))).expect("construct");
        let item = c.get(&Value::from("vm")).expect("get").expect("present");
        assert_eq!(item, &Value::Enum(status.member("ON").expect("member")));
        assert_eq!(c.to_plain(), Value::from(json!({"vm": "ON"})));
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut c = str_int().instantiate(Value::from(json!({"a": 1}))).expect("construct");
        let err = c.update(&Value::from(json!({"b": 2, "c": "x"}))).unwrap_err();
        assert_eq!(err, TypeError::mismatch("int", "str"));
        assert_eq!(c.to_plain(), Value::from(json!({"a": 1})));
    }

    #[test]
    fn update_rejects_non_mappings() {
        let mut c = Container::empty(&str_int()).expect("empty");
        assert!(matches!(
            c.update(&Value::from(json!([1]))),
            Err(TypeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn pop_and_pop_item() {
        let mut c = str_int().instantiate(Value::from(json!({"a": 1, "b": 2}))).expect("construct");
        assert_eq!(c.pop_entry(&Value::from("a")).expect("pop"), Value::Int(1));
        assert!(matches!(c.pop_entry(&Value::from("a")), Err(TypeError::NotFound { .. })));
        assert_eq!(c.pop_item().expect("pop_item"), (Key::from("b"), Value::Int(2)));
        assert!(matches!(c.pop_item(), Err(TypeError::NotFound { .. })));
    }

    #[test]
    fn views_follow_key_order() {
        let c = str_int().instantiate(Value::from(json!({"b": 2, "a": 1}))).expect("construct");
        let keys: Vec<&Key> = c.keys().expect("keys").collect();
        assert_eq!(keys, vec![&Key::from("a"), &Key::from("b")]);
        let values: Vec<&Value> = c.values().expect("values").collect();
        assert_eq!(values, vec![&Value::Int(1), &Value::Int(2)]);
        assert_eq!(c.items().expect("items").count(), 2);
        assert!(c.contains_key(&Value::from("a")).expect("contains"));
        assert!(!c.contains_key(&Value::Float(1.0)).expect("contains"));
    }

    #[test]
    fn from_keys_fills_every_key() {
        let c = Container::from_keys(&str_int(), [Value::from("x"), Value::from("y")], Value::Int(0))
            .expect("from_keys");
        assert_eq!(c.to_plain(), Value::from(json!({"x": 0, "y": 0})));
    }

    #[test]
    fn sequence_views_are_unsupported() {
        let c = crate::registry::list(TypeRef::Int)
            .and_then(|ty| Container::empty(&ty))
            .expect("list");
        assert!(matches!(c.keys().err(), Some(TypeError::UnsupportedOperation { .. })));
    }
}
