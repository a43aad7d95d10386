//! Newtype identifiers for declared types and their slots.
//!
//! Declared types (enumerations, records, templates, parameterizations) are
//! compared by identity, never by name: two enumerations both called `Status`
//! are different types. [`DeclaredTypeId`] carries that identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new name, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wraps a name already known to be non-empty.
            pub(crate) fn from_trusted(value: impl Into<String>) -> Self {
                Self(value.into())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Name of a type-parameter slot declared by a template (e.g. `"item_type"`).
    SlotName
}

string_id! {
    /// Display name of a declared type (e.g. `"Map"`, `"MapIntInt"`, `"Status"`).
    ///
    /// Names are for humans and error messages only; identity is carried by
    /// [`DeclaredTypeId`].
    TypeName
}

/// Upper-cases the first character and lower-cases the rest, as used when
/// synthesizing parameterization names.
pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Identity of declared types
// ---------------------------------------------------------------------------

/// Identifies one declared type.
///
/// Generated fresh for every declaration and every parameterization, so two
/// parameterizations created from identical bindings are still distinct types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeclaredTypeId(Uuid);

impl DeclaredTypeId {
    /// Generates a new random identity.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Identity reserved for a built-in declaration.
    pub(crate) const fn builtin(n: u128) -> Self {
        Self(Uuid::from_u128(n))
    }
}

impl std::fmt::Display for DeclaredTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_reject_empty_strings() {
        assert!(SlotName::new("").is_none());
        assert_eq!(SlotName::new("item_type").expect("slot").as_str(), "item_type");
    }

    #[test]
    fn capitalized_lowercases_the_tail() {
        assert_eq!(capitalize("MapIntInt"), "Mapintint");
        assert_eq!(capitalize("int"), "Int");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn random_ids_are_distinct() {
        assert_ne!(DeclaredTypeId::new_random(), DeclaredTypeId::new_random());
    }
}
