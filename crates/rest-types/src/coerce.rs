//! Single-value acceptance and coercion.

use typed::{DeclaredType, TimestampType, TypeError, TypeRef, Value};

/// Returns `true` if `value` can be used for a field declared as `ty`.
///
/// Null is accepted when `allow_missing` is set. Otherwise the value must be
/// an instance of `ty`, a label of a declared enumeration, content a generic
/// or record type accepts, or a well-formed timestamp string. Never fails.
pub fn is_acceptable(value: &Value, ty: &TypeRef, allow_missing: bool) -> bool {
    if allow_missing && value.is_null() {
        return true;
    }
    ty.admits(value) || (matches!(ty, TypeRef::Timestamp) && TimestampType.accepts(value))
}

/// Converts `value` into an instance of `ty`.
///
/// Returns `Ok(None)` for null when `allow_missing` is set. Enumerations,
/// generic containers, records and timestamps are constructed from their raw
/// form unless `value` already is an instance; every other type only passes
/// its own instances through.
pub fn coerce(value: &Value, ty: &TypeRef, allow_missing: bool) -> Result<Option<Value>, TypeError> {
    if allow_missing && value.is_null() {
        return Ok(None);
    }
    if ty.is_instance(value) {
        return Ok(Some(value.clone()));
    }
    match ty.declared() {
        Some(declared) => {
            let typed = declared.construct(value)?;
            if matches!(ty, TypeRef::Timestamp) {
                tracing::trace!(raw = %value, coerced = %typed, "coerced timestamp");
            }
            Ok(Some(typed))
        }
        None => Err(TypeError::Coercion {
            type_name: ty.name().to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typed::{list, EnumType};

    #[test]
    fn nulls_depend_on_allow_missing() {
        assert!(is_acceptable(&Value::Null, &TypeRef::Int, true));
        assert!(!is_acceptable(&Value::Null, &TypeRef::Int, false));
        assert_eq!(coerce(&Value::Null, &TypeRef::Int, true).expect("coerce"), None);
        assert!(coerce(&Value::Null, &TypeRef::Int, false).is_err());
    }

    #[test]
    fn scalars_pass_through_unchanged() {
        assert_eq!(
            coerce(&Value::Int(4), &TypeRef::Int, false).expect("coerce"),
            Some(Value::Int(4))
        );
        let err = coerce(&Value::from("4"), &TypeRef::Int, false).unwrap_err();
        assert_eq!(
            err,
            TypeError::Coercion {
                type_name: "int".to_string(),
                value: "\"4\"".to_string(),
            }
        );
    }

    #[test]
    fn enum_labels_are_constructed() {
        let status = EnumType::new("Status", ["ON", "OFF"]).expect("enum");
        let ty = TypeRef::from(status.clone());
        assert!(is_acceptable(&Value::from("ON"), &ty, false));
        assert!(!is_acceptable(&Value::from("DIMMED"), &ty, false));
        let member = coerce(&Value::from("OFF"), &ty, false).expect("coerce");
        assert_eq!(member, Some(Value::Enum(status.member("OFF").expect("member"))));
        assert!(matches!(
            coerce(&Value::from("DIMMED"), &ty, false),
            Err(TypeError::Coercion { .. })
        ));
    }

    #[test]
    fn containers_are_constructed() {
        let ty = TypeRef::from(list(TypeRef::Str).expect("list[str]"));
        let raw = Value::Seq(vec![Value::from("a")]);
        assert!(is_acceptable(&raw, &ty, false));
        let Some(Value::Typed(c)) = coerce(&raw, &ty, false).expect("coerce") else {
            panic!("expected a container");
        };
        assert_eq!(c.to_plain(), raw);
    }

    #[test]
    fn timestamp_strings_are_acceptable() {
        assert!(is_acceptable(&Value::from("2021-06-01T10:15:00+0200"), &TypeRef::Timestamp, false));
        assert!(!is_acceptable(&Value::from("2021-06-01"), &TypeRef::Timestamp, false));
    }
}
