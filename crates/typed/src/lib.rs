//! Runtime generic type system for hierarchical wire data.
//!
//! Templates declare type-parameter slots; binding concrete types to them
//! produces parameterized types, and containers of those types validate every
//! element they hold. A structural, covariant compatibility relation lets a
//! value built under one parameterization be recognised as an instance of
//! another whose constraints it satisfies.
//!
//! ## Architectural Layer
//!
//! **Domain library.** No I/O, no global mutable state. The only process-wide
//! values are the immutable built-in templates, initialised on first use.
//! Schema validation of raw records builds on this crate in `rest-types`.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Slot and type names, declared-type identities |
//! | [`errors`] | `TypeError` and `ParameterizationError` |
//! | [`types`] | `TypeRef`, the `DeclaredType` capability trait, enumerations, timestamps |
//! | [`value`] | Raw and typed `Value`s, hashable `Key`s, records |
//! | [`slot`] | Write-once `FieldSlot`s and per-owner `SlotBindings` |
//! | [`registry`] | Templates, parameterization, compatibility |
//! | [`container`] | The generic container base |
//! | [`map`] | The typed mapping |
//! | [`array`] | The typed sequence |

pub mod array;
pub mod container;
pub mod errors;
pub mod identifiers;
pub mod map;
pub mod registry;
pub mod slot;
pub mod types;
pub mod value;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use container::{base_template, Container, ContainerArgs, Iter, ITEM_TYPE};
pub use errors::{FieldMismatch, ParameterizationError, TypeError};
pub use identifiers::{DeclaredTypeId, SlotName, TypeName};
pub use map::KEY_TYPE;
pub use registry::{
    dict, is_compatible, is_subtype, is_value_compatible, list, parameterize, parameterize_named,
    parameterize_one, GenericType, Parameterization, StoreKind, Template, TemplateBuilder,
};
pub use slot::{FieldSlot, SlotBindings, SlotConstraint, TypeArg};
pub use types::{DeclaredType, EnumType, EnumValue, Timestamp, TimestampType, TypeRef, TIMESTAMP_FORMAT};
pub use value::{Key, Record, Value};
