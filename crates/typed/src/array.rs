//! The typed sequence: an ordered container of `item_type`.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use crate::container::{
    admits_element, base_template, check_element, coerce_element, declared_element_type, Container,
    Store, ITEM_TYPE,
};
use crate::identifiers::SlotName;
use crate::registry::{GenericType, StoreKind, Template};
use crate::slot::FieldSlot;
use crate::value::Value;
use crate::TypeError;

/// The built-in `Array` template with the single slot `item_type`.
pub fn template() -> Arc<Template> {
    static ARRAY: OnceLock<Arc<Template>> = OnceLock::new();
    Arc::clone(ARRAY.get_or_init(|| {
        Template::builtin(
            "Array",
            StoreKind::Sequence,
            Some(base_template()),
            vec![FieldSlot::new(SlotName::from_trusted(ITEM_TYPE))],
        )
    }))
}

/// Raw sequences and sequence containers whose every element is admitted.
pub(crate) fn is_acceptable(generic: &GenericType, raw: &Value) -> bool {
    let Some(item_type) = declared_element_type(generic, ITEM_TYPE) else {
        return false;
    };
    let items = match raw {
        Value::Seq(items) => items,
        Value::Typed(c) => match &c.store {
            Store::Sequence(items) => items,
            _ => return false,
        },
        _ => return false,
    };
    let noneable = generic.noneable();
    items.iter().all(|v| admits_element(item_type, noneable, v))
}

impl Container {
    fn check_item(&self, value: &Value) -> Result<(), TypeError> {
        check_element(self.element_type(ITEM_TYPE), self.noneable(), value)
    }

    pub fn append(&mut self, value: impl Into<Value>) -> Result<(), TypeError> {
        let value = value.into();
        self.check_item(&value)?;
        self.sequence_mut("append")?.push(value);
        Ok(())
    }

    /// Inserts before `index`. Negative indices count from the end and
    /// out-of-range indices clamp to the ends.
    pub fn insert(&mut self, index: i64, value: impl Into<Value>) -> Result<(), TypeError> {
        let value = value.into();
        self.check_item(&value)?;
        let items = self.sequence_mut("insert")?;
        let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
        let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
        items.insert(usize::try_from(at).unwrap_or(items.len()), value);
        Ok(())
    }

    /// Appends every element of a raw sequence or container.
    ///
    /// Elements are coerced into the item type. If any element fails nothing
    /// is appended.
    pub fn extend(&mut self, raw: &Value) -> Result<(), TypeError> {
        let item_type = self.element_type(ITEM_TYPE).clone();
        let noneable = self.noneable();
        self.sequence("extend")?;

        let elements = raw
            .elements()
            .ok_or_else(|| TypeError::mismatch("list", raw.type_name()))?;
        let staged = elements
            .iter()
            .map(|v| coerce_element(&item_type, noneable, v))
            .collect::<Result<Vec<_>, TypeError>>();

        let staged = match staged {
            Ok(staged) => staged,
            Err(err) => {
                tracing::debug!(container = self.type_name(), error = %err, "rejected extend");
                return Err(err);
            }
        };
        self.sequence_mut("extend")?.extend(staged);
        Ok(())
    }

    /// Removes the first element equal to `value`.
    pub fn remove(&mut self, value: &Value) -> Result<(), TypeError> {
        let index = self.index(value)?;
        self.sequence_mut("remove")?.remove(index);
        Ok(())
    }

    /// Number of elements equal to `value`.
    pub fn count(&self, value: &Value) -> Result<usize, TypeError> {
        self.check_item(value)?;
        Ok(self.sequence("count")?.iter().filter(|v| *v == value).count())
    }

    /// Position of the first element equal to `value`.
    pub fn index(&self, value: &Value) -> Result<usize, TypeError> {
        self.check_item(value)?;
        self.sequence("index")?
            .iter()
            .position(|v| v == value)
            .ok_or_else(|| TypeError::NotFound {
                what: format!("element {value}"),
            })
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Result<Value, TypeError> {
        self.sequence_mut("pop")?.pop().ok_or_else(|| TypeError::NotFound {
            what: "element in empty sequence".to_string(),
        })
    }

    pub fn reverse(&mut self) -> Result<(), TypeError> {
        self.sequence_mut("reverse")?.reverse();
        Ok(())
    }

    /// Sorts in ascending natural order. Fails without reordering anything if
    /// two elements are incomparable.
    pub fn sort(&mut self) -> Result<(), TypeError> {
        let snapshot = self.sequence("sort")?.clone();
        let sorted =
            merge_sort(snapshot).ok_or_else(|| TypeError::unsupported("sort", self.type_name()))?;
        *self.sequence_mut("sort")? = sorted;
        Ok(())
    }

    /// Repeats the contents in place `times` times; zero empties the sequence.
    pub fn repeat(&mut self, times: usize) -> Result<(), TypeError> {
        let items = self.sequence_mut("repeat")?;
        let original = std::mem::take(items);
        for _ in 0..times {
            items.extend(original.iter().cloned());
        }
        Ok(())
    }
}

/// Stable merge sort over the natural order. Returns `None` as soon as two
/// elements it has to compare are incomparable.
fn merge_sort(mut items: Vec<Value>) -> Option<Vec<Value>> {
    if items.len() <= 1 {
        return Some(items);
    }
    let right = items.split_off(items.len() / 2);
    let mut left = merge_sort(items)?.into_iter().peekable();
    let mut right = merge_sort(right)?.into_iter().peekable();

    let mut merged = Vec::with_capacity(left.len() + right.len());
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(a), Some(b)) => b.try_cmp(a)? == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        merged.extend(if take_right { right.next() } else { left.next() });
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::list;
    use crate::types::TypeRef;
    use serde_json::json;

    fn ints(raw: serde_json::Value) -> Container {
        list(TypeRef::Int)
            .and_then(|ty| ty.instantiate(Value::from(raw)))
            .expect("list[int]")
    }

    #[test]
    fn strings_are_not_sequences() {
        let ty = list(TypeRef::Str).expect("list[str]");
        assert!(ty.is_acceptable(&Value::from(json!(["a", "b"]))));
        assert!(!ty.is_acceptable(&Value::from("ab")));
    }

    #[test]
    fn nested_lists_are_constructed() {
        let inner = list(TypeRef::Int).expect("inner");
        let outer = list(TypeRef::from(inner.clone())).expect("outer");
        let c = outer.instantiate(Value::from(json!([[1, 2], [3]]))).expect("construct");
        let Value::Typed(first) = c.get_item(&Value::Int(0)).expect("first") else {
            panic!("nested element was not constructed");
        };
        assert!(TypeRef::from(inner).is_instance(&Value::Typed(first.clone())));
        assert_eq!(c.to_plain(), Value::from(json!([[1, 2], [3]])));
    }

    #[test]
    fn extend_is_all_or_nothing() {
        let mut c = ints(json!([1]));
        let err = c.extend(&Value::from(json!([2, "x", 3]))).unwrap_err();
        assert_eq!(err, TypeError::mismatch("int", "str"));
        assert_eq!(c.to_plain(), Value::from(json!([1])));
        c.extend(&Value::from(json!([2, 3]))).expect("extend");
        assert_eq!(c.len().expect("len"), 3);
    }

    #[test]
    fn append_and_insert_validate() {
        let mut c = ints(json!([2]));
        c.append(3).expect("append");
        c.insert(-10, 1).expect("insert clamps to the front");
        c.insert(99, 4).expect("insert clamps to the back");
        c.insert(-1, 9).expect("insert before last");
        assert_eq!(c.to_plain(), Value::from(json!([1, 2, 3, 9, 4])));
        assert!(matches!(c.append(1.5), Err(TypeError::TypeMismatch { .. })));
    }

    #[test]
    fn remove_count_and_index() {
        let mut c = ints(json!([1, 2, 1]));
        assert_eq!(c.count(&Value::Int(1)).expect("count"), 2);
        assert_eq!(c.index(&Value::Int(2)).expect("index"), 1);
        c.remove(&Value::Int(1)).expect("remove");
        assert_eq!(c.to_plain(), Value::from(json!([2, 1])));
        assert!(matches!(c.remove(&Value::Int(7)), Err(TypeError::NotFound { .. })));
        assert!(matches!(c.count(&Value::from("x")), Err(TypeError::TypeMismatch { .. })));
    }

    #[test]
    fn pop_reverse_repeat() {
        let mut c = ints(json!([1, 2]));
        c.repeat(2).expect("repeat");
        assert_eq!(c.to_plain(), Value::from(json!([1, 2, 1, 2])));
        c.reverse().expect("reverse");
        assert_eq!(c.pop().expect("pop"), Value::Int(1));
        c.repeat(0).expect("repeat");
        assert!(matches!(c.pop(), Err(TypeError::NotFound { .. })));
    }

    #[test]
    fn sort_orders_or_leaves_untouched() {
        let mut c = ints(json!([3, 1, 2]));
        c.sort().expect("sort");
        assert_eq!(c.to_plain(), Value::from(json!([1, 2, 3])));

        let mut mixed = list(TypeRef::Any)
            .and_then(|ty| ty.instantiate(Value::from(json!([2, "a", 1]))))
            .expect("list[any]");
        assert!(matches!(mixed.sort(), Err(TypeError::UnsupportedOperation { .. })));
        assert_eq!(mixed.to_plain(), Value::from(json!([2, "a", 1])));
    }

    #[test]
    fn sort_orders_long_sequences() {
        let raw: Vec<i64> = (0..50).map(|i| (i * 37) % 50).collect();
        let mut c = ints(json!(raw));
        c.sort().expect("sort");
        let expected: Vec<i64> = (0..50).collect();
        assert_eq!(c.to_plain(), Value::from(json!(expected)));

        let mut mixed = list(TypeRef::Float)
            .and_then(|ty| ty.instantiate(Value::from(json!([2.5, 1.0, 2.0, 0.5]))))
            .expect("list[float]");
        mixed.sort().expect("sort");
        assert_eq!(mixed.to_plain(), Value::from(json!([0.5, 1.0, 2.0, 2.5])));
    }

    #[test]
    fn sort_rejects_nulls_without_reordering() {
        let raw: Vec<serde_json::Value> = (0..64)
            .map(|i| if i % 4 == 1 { json!(null) } else { json!(64 - i) })
            .collect();
        let mut c = ints(json!(raw.clone()));
        assert!(matches!(c.sort(), Err(TypeError::UnsupportedOperation { .. })));
        assert_eq!(c.to_plain(), Value::from(json!(raw)));
    }

    #[test]
    fn sort_rejects_nan_without_reordering() {
        let mut items: Vec<Value> = (0..100).map(|i| Value::Float(f64::from(100 - i))).collect();
        items[37] = Value::Float(f64::NAN);
        let mut c = list(TypeRef::Float)
            .and_then(|ty| ty.instantiate(Value::Seq(items)))
            .expect("list[float]");
        assert!(matches!(c.sort(), Err(TypeError::UnsupportedOperation { .. })));
        let first = c.get_item(&Value::Int(0)).expect("first");
        assert_eq!(first, &Value::Float(100.0));
    }

    #[test]
    fn mapping_operations_are_unsupported() {
        let mut c = ints(json!([]));
        assert!(matches!(
            c.update(&Value::from(json!({}))),
            Err(TypeError::UnsupportedOperation { .. })
        ));
    }
}
